//! Prompt text for the generation service

use super::{AttachmentRef, GenerationRequest};
use sdk::types::GeneratedFile;

pub(super) const GENERATE_SYSTEM: &str = r#"You are a front-end developer. Reply with a JSON array of exactly two objects, each with the keys "type", "filename" and "content":
1. {"type": "markdown", "filename": "README.md"}
2. {"type": "html", "filename": "index.html"}

Rules:
- Build only from the task, the checks and the attachment list. Do not invent data, fields, URLs or file paths.
- When something required is missing, the page shows a visible error message and logs the reason with console.error.
- Look up data by column or key name, never by position.
- Load third-party libraries only from public CDNs and without integrity attributes. Handle load failures.
- Check that a DOM element exists before writing to it.
- Fall back to sensible defaults for absent query parameters and inputs.

Return only the JSON array. No prose, no comments, no code fences."#;

pub(super) const MODIFY_SYSTEM: &str = r#"You revise an existing two-file site. Reply with a JSON array of exactly two objects, each with the keys "type", "filename" and "content":
1. {"type": "markdown", "filename": "README.md"}
2. {"type": "html", "filename": "index.html"}

Rules:
- Change the files so they satisfy the new brief and checks. Never add, remove or rename files.
- "content" holds the complete new file, not a diff.
- Use only the listed attachments. Do not invent paths.
- When something required is missing, the page shows a visible error message and logs the reason with console.error.
- Check that a DOM element exists before writing to it.

Return only the JSON array. No prose, no comments, no code fences."#;

fn attachments_block(attachments: &[AttachmentRef]) -> String {
    serde_json::to_string_pretty(attachments).unwrap_or_else(|_| "[]".to_string())
}

pub(super) fn generate_user(request: &GenerationRequest) -> String {
    format!(
        "TASK:\n{brief}\n\n\
         EVALUATION CHECKS (design for every one):\n{checks}\n\n\
         ATTACHMENTS (filename and the relative URL to load it from):\n{attachments}\n\n\
         README.md should describe the project, explain how to open it locally \
         and mention the MIT license with a link to LICENSE. \
         index.html is the complete working page.",
        brief = request.brief,
        checks = request.checks,
        attachments = attachments_block(&request.attachments),
    )
}

pub(super) fn modify_user(request: &GenerationRequest, current: &[GeneratedFile]) -> String {
    let current = serde_json::to_string_pretty(current).unwrap_or_else(|_| "[]".to_string());
    format!(
        "CURRENT FILES:\n{current}\n\n\
         NEW BRIEF:\n{brief}\n\n\
         CHECKS (design for every one):\n{checks}\n\n\
         ATTACHMENTS:\n{attachments}",
        current = current,
        brief = request.brief,
        checks = request.checks,
        attachments = attachments_block(&request.attachments),
    )
}
