//! Prompt templates for the subscription pipeline.

use serde_json::Value;

/// Instruct-content keys produced by requirement parsing.
pub const KEY_LANGUAGE: &str = "Language";
pub const KEY_CRON: &str = "Cron Expression";
pub const KEY_URLS: &str = "Crawler URL List";
pub const KEY_EXTRACTION: &str = "Page Content Extraction";
pub const KEY_PROCESS: &str = "Crawl Post Processing";

pub const SUB_REQUIREMENT_KEYS: [&str; 5] =
    [KEY_LANGUAGE, KEY_CRON, KEY_URLS, KEY_EXTRACTION, KEY_PROCESS];

const PARSE_SUB_REQUIREMENT_TEMPLATE: &str = r#"## Context
### User Requirement
{requirements}

## Format
Reply with a single JSON object and nothing else, using exactly these keys:

- "Language": string, the language the user wrote the requirement in, e.g. "en_us".
- "Cron Expression": string, a standard five-field cron expression (minute hour day-of-month month day-of-week) for when the crawl should run.
- "Crawler URL List": array of strings, the page URLs that must be crawled.
- "Page Content Extraction": string, what to extract from each page.
- "Crawl Post Processing": string, what to do with the extracted data before it is delivered.

Example:
{
  "Language": "en_us",
  "Cron Expression": "30 9 * * *",
  "Crawler URL List": ["https://example.com/trending"],
  "Page Content Extraction": "Retrieve the name, url and description of each trending repository.",
  "Crawl Post Processing": "Summarize the list and highlight anything related to Rust."
}
"#;

const WRITE_CRAWLER_CODE_TEMPLATE: &str = r#"Please complete the web page crawler parse function to achieve the User Requirement. The parse function should take a BeautifulSoup object as input, which corresponds to the HTML outline provided in the Context.

```python
from bs4 import BeautifulSoup

# only complete the parse function
def parse(soup: BeautifulSoup):
    ...
    # Return the object that the user wants to retrieve, don't use print
```

## User Requirement
{requirement}

## Context

The outline of the html page to scrape is shown below:

```tree
{outline}
```
"#;

const SUB_ACTION_TEMPLATE: &str = r#"## Requirements
Answer the question based on the provided context {process}. If the question cannot be answered, please summarize the context.

## Context
{data}
"#;

pub fn parse_sub_requirement(requirements: &str) -> String {
    PARSE_SUB_REQUIREMENT_TEMPLATE.replace("{requirements}", requirements)
}

pub fn write_crawler_code(requirement: &str, outline: &str) -> String {
    WRITE_CRAWLER_CODE_TEMPLATE
        .replace("{requirement}", requirement)
        .replace("{outline}", outline)
}

pub fn sub_action(process: &str, data: &[Value]) -> String {
    let data = serde_json::to_string_pretty(data).unwrap_or_else(|_| format!("{data:?}"));
    SUB_ACTION_TEMPLATE
        .replace("{process}", process)
        .replace("{data}", &data)
}
