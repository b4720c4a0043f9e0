//! Tolerant parser for markdown-shaped recipe text.
//! Recognizes `# Title`, `## Section:` headers, `- item` bullets, `N. step`
//! numbered lines and `Key: value` metadata. Unrecognized lines are skipped;
//! missing sections come back empty. Never errors.

use regex::Regex;

use super::Recipe;

const DEFAULT_TITLE: &str = "Tropical Fruit Blend";
const DEFAULT_PREP_TIME: &str = "10 minutes";
const DEFAULT_SERVINGS: &str = "2";

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Ingredients,
    Instructions,
    Benefits,
    Tips,
}

fn classify_section(header: &str) -> Section {
    let lower = header.to_lowercase();
    if lower.contains("ingredient") {
        Section::Ingredients
    } else if lower.contains("instruction")
        || lower.contains("step")
        || lower.contains("method")
        || lower.contains("direction")
    {
        Section::Instructions
    } else if lower.contains("benefit") || lower.contains("nutrition") {
        Section::Benefits
    } else if lower.contains("tip") {
        Section::Tips
    } else {
        Section::None
    }
}

/// Take the value out of a `Key: value` line if it matches `key`
/// case-insensitively.
fn metadata_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (head, tail) = line.split_once(':')?;
    if head.trim().eq_ignore_ascii_case(key) {
        let value = tail.trim();
        (!value.is_empty()).then_some(value)
    } else {
        None
    }
}

/// Parse generated text into a structured recipe.
pub fn parse_recipe_text(text: &str) -> Recipe {
    // "1. step" / "2) step"
    let numbered = Regex::new(r"^\d+[.)]\s*").expect("numbered-step pattern is valid");

    let mut title = None;
    let mut ingredients = Vec::new();
    let mut instructions = Vec::new();
    let mut benefits = Vec::new();
    let mut tips = Vec::new();
    let mut prep_time = None;
    let mut servings = None;
    let mut section = Section::None;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix("##") {
            section = classify_section(header);
            continue;
        }
        if let Some(heading) = line.strip_prefix('#') {
            let heading = heading.trim();
            if title.is_none() && !heading.is_empty() {
                title = Some(heading.to_string());
            }
            continue;
        }

        if let Some(value) = metadata_value(line, "prep time") {
            prep_time.get_or_insert_with(|| value.to_string());
            continue;
        }
        if let Some(value) = metadata_value(line, "servings") {
            servings.get_or_insert_with(|| value.to_string());
            continue;
        }

        if let Some(item) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            match section {
                Section::Ingredients => ingredients.push(item.to_string()),
                Section::Instructions => instructions.push(item.to_string()),
                Section::Benefits => benefits.push(item.to_string()),
                Section::Tips => tips.push(item.to_string()),
                Section::None => {}
            }
            continue;
        }

        if let Some(m) = numbered.find(line) {
            let step = line[m.end()..].trim();
            // Numbered lines are steps even when the header was missing.
            if !step.is_empty() && matches!(section, Section::Instructions | Section::None) {
                instructions.push(step.to_string());
            }
            continue;
        }

        // Anything else is ignored.
    }

    Recipe {
        title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        ingredients,
        instructions,
        nutritional_benefits: benefits,
        tips,
        prep_time: prep_time.unwrap_or_else(|| DEFAULT_PREP_TIME.to_string()),
        servings: servings.unwrap_or_else(|| DEFAULT_SERVINGS.to_string()),
    }
}
