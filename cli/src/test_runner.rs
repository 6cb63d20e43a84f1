use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use livedoc::parser::ParseError;
use runtime::{ExecutionResult, RuntimeConfig, Session};

#[derive(Debug, Deserialize)]
pub struct ExpectedWarning {
    /// Substring that must appear in the warning message.
    pub contains: String,

    /// If set, the warning's span must start on this 1-based source line.
    #[serde(default)]
    pub line: Option<usize>,
}

/// What one `results[resultId]` slot must hold after the clicks.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectedResult {
    /// Exact `displayText`.
    #[serde(default)]
    pub display: Option<String>,

    /// Exact captured log lines.
    #[serde(default)]
    pub logs: Option<Vec<String>>,

    /// Substring of the error; implies the script failed.
    #[serde(default)]
    pub error: Option<String>,

    /// The slot must not exist (script never ran or never published).
    #[serde(default)]
    pub absent: bool,
}

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Values typed into text inputs, by input id, before any click.
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,

    /// Event ids clicked in order.
    #[serde(default)]
    pub clicks: Vec<String>,

    #[serde(default)]
    pub expect_results: BTreeMap<String, ExpectedResult>,

    /// Substrings the rendered document must contain.
    #[serde(default)]
    pub expect_render: Vec<String>,

    /// Expected warnings. If present (even empty), warning count and content are checked.
    /// Each entry checks message substring and optionally the source line.
    #[serde(default)]
    pub expect_warnings: Option<Vec<ExpectedWarning>>,
}

/// Parse a `.test.md` file into its TOML config and document source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}'); // strip BOM

    if !content.starts_with("---") {
        return Err("missing opening --- frontmatter delimiter".into());
    }

    let after_open = &content[3..];
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest_start = close_pos + 4; // skip \n---
    let source = after_open[rest_start..]
        .strip_prefix("\r\n")
        .or_else(|| after_open[rest_start..].strip_prefix('\n'))
        .unwrap_or(&after_open[rest_start..]);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("cannot read file: {}", e)),
            };
        }
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("frontmatter error: {}", e)),
            };
        }
    };

    let description = config.description.clone();
    let outcome = match check_document(&config, source) {
        None => TestOutcome::Pass,
        Some(reason) => TestOutcome::Fail(reason),
    };
    TestResult {
        path: path.to_path_buf(),
        description,
        outcome,
    }
}

/// Mount `source`, drive it as the config says, and compare. Returns
/// `Some(reason)` on the first mismatch.
fn check_document(config: &TestConfig, source: &str) -> Option<String> {
    let mut session = Session::open(source, RuntimeConfig::default());

    for (id, value) in &config.inputs {
        if let Err(e) = session.set_input(id, value) {
            return Some(format!("input '{}': {}", id, e));
        }
    }
    for event_id in &config.clicks {
        if let Err(e) = session.click(event_id) {
            return Some(format!("click '{}': {}", event_id, e));
        }
    }

    for (result_id, expected) in &config.expect_results {
        let actual = session.result(result_id);
        if let Some(reason) = check_result(result_id, actual.as_ref(), expected) {
            return Some(reason);
        }
    }

    if !config.expect_render.is_empty() {
        let rendered = session.render();
        for needle in &config.expect_render {
            if !rendered.contains(needle.as_str()) {
                return Some(format!(
                    "rendered document does not contain \"{}\"\n  rendered:\n{}",
                    needle,
                    indent(&rendered)
                ));
            }
        }
    }

    if let Some(expected_warnings) = &config.expect_warnings {
        return check_warnings(source, session.diagnostics(), expected_warnings);
    }
    None
}

fn check_result(result_id: &str, actual: Option<&ExecutionResult>, expected: &ExpectedResult) -> Option<String> {
    let Some(actual) = actual else {
        if expected.absent {
            return None;
        }
        return Some(format!("results[{}]: no result was published", result_id));
    };
    if expected.absent {
        return Some(format!("results[{}]: expected no result, got {:?}", result_id, actual));
    }

    match (&expected.error, &actual.error) {
        (Some(want), Some(got)) if !got.contains(want.as_str()) => {
            return Some(format!(
                "results[{}]: expected error containing \"{}\", got: {}",
                result_id, want, got
            ));
        }
        (Some(want), None) => {
            return Some(format!(
                "results[{}]: expected error containing \"{}\", but the script succeeded",
                result_id, want
            ));
        }
        (None, Some(got)) => {
            return Some(format!("results[{}]: unexpected script error: {}", result_id, got));
        }
        _ => {}
    }

    if let Some(want) = &expected.display {
        if actual.display_text.as_deref() != Some(want.as_str()) {
            return Some(format!(
                "results[{}]: display mismatch\n  expected: {}\n  actual:   {}",
                result_id,
                want,
                actual.display_text.as_deref().unwrap_or("(none)")
            ));
        }
    }

    if let Some(want) = &expected.logs {
        if &actual.logs != want {
            return Some(format!(
                "results[{}]: logs mismatch\n  expected: {:?}\n  actual:   {:?}",
                result_id, want, actual.logs
            ));
        }
    }

    None
}

fn indent(text: &str) -> String {
    text.lines().map(|line| format!("    {}", line)).collect::<Vec<_>>().join("\n")
}

/// Check that actual warnings match expectations. Returns `Some(reason)` on mismatch.
fn check_warnings(source: &str, diagnostics: &[ParseError], expected: &[ExpectedWarning]) -> Option<String> {
    let actual_warnings: Vec<&ParseError> = diagnostics.iter().filter(|d| d.is_warning()).collect();

    if actual_warnings.len() != expected.len() {
        let actual_msgs: Vec<String> = actual_warnings
            .iter()
            .map(|w| format!("  - {}", w))
            .collect();
        return Some(format!(
            "expected {} warning(s), got {}\n  actual warnings:\n{}",
            expected.len(),
            actual_warnings.len(),
            if actual_msgs.is_empty() {
                "    (none)".to_string()
            } else {
                actual_msgs.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in actual_warnings.iter().zip(expected.iter()).enumerate() {
        let msg = actual.to_string();

        if !msg.contains(&expected.contains) {
            return Some(format!(
                "warning[{}]: expected message containing \"{}\", got: {}",
                i, expected.contains, msg
            ));
        }

        if let Some(expected_line) = expected.line {
            let actual_line = actual.line(source);
            if actual_line != expected_line {
                return Some(format!(
                    "warning[{}]: expected on line {}, but span is on line {}",
                    i, expected_line, actual_line
                ));
            }
        }
    }

    None
}

/// Discover `.test.md` files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.ends_with(".test.md") {
                let category = path
                    .parent()
                    .and_then(|p| p.strip_prefix(root).ok())
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                out.entry(category).or_default().push(path);
            }
        }
    }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

fn pass_label(no_color: bool) -> &'static str {
    if no_color { "PASS" } else { "\x1b[32mPASS\x1b[0m" }
}

fn fail_label(no_color: bool) -> &'static str {
    if no_color { "FAIL" } else { "\x1b[31mFAIL\x1b[0m" }
}

fn bold(s: &str, no_color: bool) -> String {
    if no_color {
        s.to_string()
    } else {
        format!("\x1b[1m{}\x1b[0m", s)
    }
}

fn test_label<'a>(result: &'a TestResult) -> &'a str {
    result
        .description
        .as_deref()
        .unwrap_or_else(|| result.path.file_stem().and_then(|s| s.to_str()).unwrap_or("?"))
}

/// Run all `.test.md` files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let run_categories: BTreeMap<String, Vec<PathBuf>> = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        let all_categories = discover_categorized(path);
        if all_categories.is_empty() {
            eprintln!("no .test.md files found in {}", path.display());
            return 1;
        }
        if categories.is_empty() {
            all_categories
        } else {
            filter_categories(all_categories, categories)
        }
    };

    if run_categories.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &run_categories {
        if !path.is_file() {
            let header = if cat.is_empty() { "(root)" } else { cat.as_str() };
            eprintln!();
            eprintln!("{}", bold(header, no_color));
        }

        for file in files {
            let result = run_single_test(file);
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", pass_label(no_color), test_label(&result));
                }
                TestOutcome::Fail(_) => {
                    failed += 1;
                    eprintln!("  {}  {}", fail_label(no_color), test_label(&result));
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failed == 0 {
        if no_color {
            eprintln!("test result: ok. {} passed, 0 failed", passed);
        } else {
            eprintln!("test result: \x1b[32mok\x1b[0m. {} passed, 0 failed", passed);
        }
        0
    } else {
        let total = passed + failed;
        if no_color {
            eprintln!("test result: FAILED. {} passed, {} failed (of {})", passed, failed, total);
        } else {
            eprintln!(
                "test result: \x1b[31mFAILED\x1b[0m. {} passed, {} failed (of {})",
                passed, failed, total
            );
        }
        1
    }
}

fn filter_categories(
    all_categories: BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<String, Vec<PathBuf>> {
    let mut filtered = BTreeMap::new();
    for requested in requested {
        let req = requested.trim_matches('/');
        let mut found = false;
        for (cat, files) in &all_categories {
            if cat == req || cat.starts_with(&format!("{}/", req)) {
                filtered.insert(cat.clone(), files.clone());
                found = true;
            }
        }
        if !found {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all_categories
                    .keys()
                    .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    const BMI_TEST: &str = r#"---
description = "bmi from typed values"
clicks = ["bmi"]

[inputs]
weight = "80"

[expect_results.bmi]
display = "27.68"
logs = []
---
::textinput{id="height" defaultValue="170"}

::textinput{id="weight" defaultValue="65"}

::button[Calculate]{eventId="bmi"}

:::js{eventId="bmi" resultId="bmi"}
const h = parseFloat(inputs.height) / 100;
(parseFloat(inputs.weight) / (h * h)).toFixed(2);
:::
"#;

    #[test]
    fn frontmatter_is_split_from_source() {
        let (config, source) = parse_test_file(BMI_TEST).unwrap();
        assert_eq!(config.description.as_deref(), Some("bmi from typed values"));
        assert_eq!(config.clicks, vec!["bmi".to_string()]);
        assert_eq!(config.inputs.get("weight").map(String::as_str), Some("80"));
        assert!(source.starts_with("::textinput"));
    }

    #[test]
    fn matching_document_passes() {
        let (config, source) = parse_test_file(BMI_TEST).unwrap();
        assert_eq!(check_document(&config, source), None);
    }

    #[test]
    fn display_mismatch_is_reported() {
        let content = BMI_TEST.replace("27.68", "1.00");
        let (config, source) = parse_test_file(&content).unwrap();
        let reason = check_document(&config, source).unwrap();
        assert!(reason.contains("display mismatch"), "{reason}");
    }

    #[test]
    fn expected_errors_and_absent_results() {
        let content = r#"---
clicks = ["go"]

[expect_results.r]
error = "boom"

[expect_results.never]
absent = true
---
::button{eventId="go"}

:::js{eventId="go" resultId="r"}
throw new Error("boom")
:::
"#;
        let (config, source) = parse_test_file(content).unwrap();
        assert_eq!(check_document(&config, source), None);
    }

    #[test]
    fn warnings_are_checked_with_lines() {
        let content = "---\nexpect_warnings = [{ contains = \"duplicate\", line = 3 }]\n---\n::textinput{id=\"a\"}\n\n::textinput{id=\"a\"}\n";
        let (config, source) = parse_test_file(content).unwrap();
        assert_eq!(check_document(&config, source), None);
    }

    #[test]
    fn unknown_click_fails() {
        let content = "---\nclicks = [\"missing\"]\n---\n# nothing\n";
        let (config, source) = parse_test_file(content).unwrap();
        assert!(check_document(&config, source).unwrap().contains("missing"));
    }

    #[test]
    fn missing_frontmatter_is_an_error() {
        assert!(parse_test_file("# no frontmatter\n").is_err());
    }
}
