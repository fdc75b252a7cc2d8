//! Prompts for the bundled LLM-backed adapters.
//!
//! Every prompt lives here so a change in wording is a one-file diff and
//! tests can inspect the prompts without a live model.

/// System prompt for captioning a figure crop or an embedded image.
pub const CAPTION_SYSTEM_PROMPT: &str = r#"You caption images taken from scientific papers.

Describe the image in ONE short sentence (at most 30 words):
- Say what kind of visual it is (plot, diagram, photo, table, screenshot, ...)
- Name what it shows, using labels and legend text visible in the image
- Do NOT speculate beyond what is visible
- Do NOT start with "This image" or "The image"
- Output only the sentence, no quotes, no markdown"#;

/// System prompt for layout detection on a rendered page.
///
/// Coordinates are requested on a 0–1000 grid so the answer does not depend
/// on the model knowing the pixel size of the upload.
pub const LAYOUT_SYSTEM_PROMPT: &str = r#"You are a document layout detector.

Find every layout region on the page image and classify it as one of:
text, title, list, table, figure.

A "figure" is any chart, plot, diagram, photograph or illustration,
without its caption text.

Answer with a JSON array only, no prose and no markdown fences:
[{"category": "figure", "box": [x1, y1, x2, y2], "score": 0.93}, ...]

- box coordinates are normalised to 0..1000, origin at the top-left corner
- x1 < x2 and y1 < y2
- score is your confidence between 0 and 1
- list regions in reading order
- answer [] if the page is empty"#;

/// System prompt for entity extraction from a caption.
pub const ENTITY_SYSTEM_PROMPT: &str = r#"You extract named entities from short captions of scientific figures.

Return every entity span (method names, datasets, organisations, people,
places, dates, quantities, percentages) exactly as written in the text,
in order of appearance. Keep duplicates.

Answer with a JSON array of strings only, no prose and no markdown fences.
Answer [] if there are none."#;

/// User message wrapping the caption text for entity extraction.
pub fn entity_user_prompt(text: &str) -> String {
    format!("Text:\n\"\"\"{}\"\"\"", text)
}
