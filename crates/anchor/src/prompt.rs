//! Prompt templates that wrap anchor text for a vision-language model, and
//! the chat payload pairing a prompt with its page image.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Named prompt variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptTemplate {
    /// Markdown output with markdown tables and image placeholders.
    Default,
    /// Markdown output with HTML tables and `<figure>` image analysis.
    Structure,
}

const DEFAULT_INSTRUCTIONS: &str = "Below is an image of a document page along with its dimensions. \
Simply return the markdown representation of this document, presenting tables in markdown format as they naturally appear.\n\
If the document contains images, use a placeholder like dummy.png for each image.\n\
Your final output must be in JSON format with a single key `natural_text` containing the response.\n";

const STRUCTURE_INSTRUCTIONS: &str = "Below is an image of a document page, along with its dimensions and possibly some raw textual content previously extracted from it. \
Note that the text extraction may be incomplete or partially missing. Carefully consider both the layout and any available text to reconstruct the document accurately.\n\
Your task is to return the markdown representation of this document, presenting tables in HTML format as they naturally appear.\n\
If the document contains images or figures, analyze them and include the tag <figure>IMAGE_ANALYSIS</figure> in the appropriate location.\n\
Your final output must be in JSON format with a single key `natural_text` containing the response.\n";

impl PromptTemplate {
    pub const ALL: [PromptTemplate; 2] = [PromptTemplate::Default, PromptTemplate::Structure];

    pub fn name(&self) -> &'static str {
        match self {
            PromptTemplate::Default => "default",
            PromptTemplate::Structure => "structure",
        }
    }

    /// Fill the template with `anchor_text`.
    pub fn render(&self, anchor_text: &str) -> String {
        let instructions = match self {
            PromptTemplate::Default => DEFAULT_INSTRUCTIONS,
            PromptTemplate::Structure => STRUCTURE_INSTRUCTIONS,
        };
        format!("{instructions}RAW_TEXT_START\n{anchor_text}\nRAW_TEXT_END")
    }
}

impl std::fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Look a template up by name. Unknown names give `None`.
pub fn get_prompt(name: &str) -> Option<PromptTemplate> {
    PromptTemplate::ALL.into_iter().find(|t| t.name() == name)
}

/// A single-turn chat payload: the prompt text followed by the page image as
/// a PNG data URL.
pub fn build_page_messages(prompt: &str, base64_png: &str) -> Value {
    json!([
        {
            "role": "user",
            "content": [
                { "type": "text", "text": prompt },
                {
                    "type": "image_url",
                    "image_url": { "url": format!("data:image/png;base64,{base64_png}") }
                }
            ]
        }
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name() {
        assert_eq!(get_prompt("default"), Some(PromptTemplate::Default));
        assert_eq!(get_prompt("structure"), Some(PromptTemplate::Structure));
        assert_eq!(get_prompt("Default"), None);
        assert_eq!(get_prompt("v3"), None);
    }

    #[test]
    fn render_wraps_anchor_text() {
        let anchor = "Page dimensions: 612.0x792.0\n[72x700]Hello";
        for template in PromptTemplate::ALL {
            let prompt = template.render(anchor);
            assert!(prompt.ends_with(
                "RAW_TEXT_START\nPage dimensions: 612.0x792.0\n[72x700]Hello\nRAW_TEXT_END"
            ));
            assert!(prompt.contains("`natural_text`"));
        }
    }

    #[test]
    fn templates_differ_on_tables() {
        assert!(PromptTemplate::Default
            .render("")
            .contains("presenting tables in markdown format"));
        assert!(PromptTemplate::Structure
            .render("")
            .contains("<figure>IMAGE_ANALYSIS</figure>"));
    }

    #[test]
    fn page_messages_shape() {
        let messages = build_page_messages("hi", "aGVsbG8=");
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"][0]["type"], "text");
        assert_eq!(messages[0]["content"][0]["text"], "hi");
        assert_eq!(
            messages[0]["content"][1]["image_url"]["url"],
            "data:image/png;base64,aGVsbG8="
        );
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(
            serde_json::to_string(&PromptTemplate::Structure).unwrap(),
            "\"structure\""
        );
        assert_eq!(PromptTemplate::Default.to_string(), "default");
    }
}
