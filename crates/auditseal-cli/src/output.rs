//! Output formatting utilities for CLI commands.

use serde::Serialize;
use std::io::Write;

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Types that can be printed by a command.
pub trait FormattedOutput {
    fn format_text(&self) -> String;

    fn format_json(&self) -> Result<String, serde_json::Error>
    where
        Self: Serialize,
    {
        serde_json::to_string_pretty(self)
    }
}

/// Print `value` to `writer` in the selected format.
pub fn write_output<T, W>(format: OutputFormat, value: &T, writer: &mut W) -> anyhow::Result<()>
where
    T: FormattedOutput + Serialize,
    W: Write + ?Sized,
{
    let output = match format {
        OutputFormat::Text => value.format_text(),
        OutputFormat::Json => value.format_json()?,
    };
    writeln!(writer, "{output}")?;
    Ok(())
}

pub(crate) fn mark(passed: bool) -> &'static str {
    if passed {
        "PASS"
    } else {
        "FAIL"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Greeting {
        text: &'static str,
    }

    impl FormattedOutput for Greeting {
        fn format_text(&self) -> String {
            self.text.to_string()
        }
    }

    #[test]
    fn test_text_and_json_output() {
        let value = Greeting { text: "hello" };

        let mut text = Vec::new();
        write_output(OutputFormat::Text, &value, &mut text).unwrap();
        assert_eq!(String::from_utf8(text).unwrap(), "hello\n");

        let mut json = Vec::new();
        write_output(OutputFormat::Json, &value, &mut json).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed["text"], "hello");
    }
}
