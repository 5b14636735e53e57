use serde::Serialize;

use crate::cli::OutputFormat;

/// Render a serializable response to a string in the requested format.
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Raw => Ok(serde_json::to_string(value)?),
    }
}

/// Print a serializable response in the requested format.
pub fn output<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    let rendered = render(value, format)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use verdict_pipeline::TickSummary;

    use super::render;
    use crate::cli::OutputFormat;

    fn summary() -> TickSummary {
        TickSummary {
            due: 2,
            evaluated: 1,
            failed: 1,
            skipped: 0,
            pruned: 2,
        }
    }

    #[test]
    fn json_is_pretty_printed() {
        let out = render(&summary(), OutputFormat::Json).expect("json render should work");
        assert!(out.lines().count() > 1);
        let parsed: serde_json::Value = serde_json::from_str(&out).expect("json should parse");
        assert_eq!(parsed["evaluated"], 1);
        assert_eq!(parsed["pruned"], 2);
    }

    #[test]
    fn raw_is_one_line_with_same_content() {
        let raw = render(&summary(), OutputFormat::Raw).expect("raw render should work");
        let pretty = render(&summary(), OutputFormat::Json).expect("json render should work");
        assert!(!raw.contains('\n'));
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&raw).expect("raw should parse"),
            serde_json::from_str::<serde_json::Value>(&pretty).expect("json should parse"),
        );
    }
}
