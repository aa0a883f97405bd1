//! Shape checks for incoming submissions

use regex::Regex;
use sdk::types::SiteRequest;
use std::sync::OnceLock;

static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
static HTTP_URL: OnceLock<Option<Regex>> = OnceLock::new();
static REPO_NAME: OnceLock<Option<Regex>> = OnceLock::new();

fn matches(cell: &'static OnceLock<Option<Regex>>, pattern: &str, value: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

/// Every problem with `request`, empty when it is well formed
pub fn problems(request: &SiteRequest) -> Vec<String> {
    let mut problems = Vec::new();

    let required = [
        ("email", &request.email),
        ("secret", &request.secret),
        ("task", &request.task),
        ("nonce", &request.nonce),
        ("brief", &request.brief),
        ("evaluation_url", &request.evaluation_url),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            problems.push(format!("{} is required", field));
        }
    }

    if !request.email.is_empty()
        && !matches(&EMAIL, r"^[^\s@]+@[^\s@]+\.[^\s@]+$", &request.email)
    {
        problems.push("email is not a valid address".to_string());
    }

    if !request.task.is_empty()
        && !matches(&REPO_NAME, r"^[A-Za-z0-9._-]{1,100}$", &request.task)
    {
        problems.push("task may only contain letters, digits, '.', '-' and '_'".to_string());
    }

    if !request.evaluation_url.is_empty()
        && !matches(&HTTP_URL, r"^https?://[^\s/?#]+[^\s]*$", &request.evaluation_url)
    {
        problems.push("evaluation_url must be an http(s) URL".to_string());
    }

    for (i, attachment) in request.attachments.iter().enumerate() {
        if attachment.name.trim().is_empty() {
            problems.push(format!("attachments[{}].name is required", i));
        }
        if attachment.url.trim().is_empty() {
            problems.push(format!("attachments[{}].url is required", i));
        }
    }

    problems
}
