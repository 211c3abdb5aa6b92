use crate::pipeline::templates::{InstructionPair, Vocabulary};

/// Appended to every extraction instruction: the normalizer and the record
/// encoder both rely on this output shape.
pub const CATALOG_OUTPUT_DIRECTIVE: &str = "\
Respond with a single JSON object and nothing else. \
Use three-digit MARC tags as keys (for example \"245\"). \
Each value is either a string or an object whose keys are one-character subfield codes. \
Field indicators may be given as \"ind1\" and \"ind2\" inside a field object. \
Information that has no MARC tag may use descriptive keys.";

/// Build the scout instruction, enumerating exactly the known vocabulary.
pub fn classifier_instruction(vocabulary: &Vocabulary) -> String {
    let labels = quoted_list(vocabulary.labels.iter());
    let languages = quoted_list(vocabulary.languages.iter());

    format!(
        "Identify the library item in this image. \
Respond with JSON only: {{\"label\": <label>, \"lang\": <language>, \"is_valid\": <bool>}}.\n\
\"label\" must be exactly one of: {labels}.\n\
\"lang\" must be exactly one of: {languages}.\n\
\"is_valid\" is true only if the image shows a library item that can be cataloged \
(book cover, title page, poster); otherwise false."
    )
}

/// Extraction instruction first, formatting instruction second, then the
/// fixed output directive.
pub fn extraction_instruction(pair: &InstructionPair) -> String {
    format!(
        "{}\n\n{}\n\n{}",
        pair.extraction_instruction.trim(),
        pair.formatting_instruction.trim(),
        CATALOG_OUTPUT_DIRECTIVE
    )
}

fn quoted_list<'a>(items: impl Iterator<Item = &'a String>) -> String {
    items
        .map(|item| format!("\"{item}\""))
        .collect::<Vec<_>>()
        .join(", ")
}
