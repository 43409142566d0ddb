use super::*;
use super::formatter;
use crate::github::ReportMode;
use std::fs;
use tracing::info;

pub struct TextGenerator;

impl OutputGenerator for TextGenerator {
    fn generate(&self, as_of: NaiveDate, entries: &[ReportEntry]) -> Result<String> {
        Ok(format!(
            "Contributions on {}\n\n{}\n",
            as_of,
            formatter::format_detailed_report(entries)
        ))
    }
}

pub struct JsonGenerator {
    mode: ReportMode,
}

#[derive(Serialize)]
struct RankedEntry<'a> {
    rank: usize,
    #[serde(flatten)]
    entry: &'a ReportEntry,
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    as_of: NaiveDate,
    mode: ReportMode,
    entries: Vec<RankedEntry<'a>>,
}

impl OutputGenerator for JsonGenerator {
    fn generate(&self, as_of: NaiveDate, entries: &[ReportEntry]) -> Result<String> {
        let document = ReportDocument {
            as_of,
            mode: self.mode,
            entries: formatter::rank(entries)
                .into_iter()
                .enumerate()
                .map(|(i, entry)| RankedEntry { rank: i + 1, entry })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }
}

/// Renders a report and sends it to stdout or a file.
pub struct Reporter {
    format: OutputFormat,
    output_path: Option<String>,
}

impl Reporter {
    pub fn new(format: &str, output_path: Option<&str>) -> Self {
        let format = OutputFormat::from(format);
        let output_path = output_path.map(|path| super::add_file_extension(path, &format));

        Self {
            format,
            output_path,
        }
    }

    pub fn render(&self, as_of: NaiveDate, mode: ReportMode, entries: &[ReportEntry]) -> Result<String> {
        match self.format {
            OutputFormat::Text => TextGenerator.generate(as_of, entries),
            OutputFormat::Json => JsonGenerator { mode }.generate(as_of, entries),
        }
    }

    pub fn generate_report(
        &self,
        as_of: NaiveDate,
        mode: ReportMode,
        entries: &[ReportEntry],
    ) -> Result<()> {
        let content = self.render(as_of, mode, entries)?;

        match &self.output_path {
            Some(path) => {
                fs::write(path, content)?;
                info!("Report saved to {}", path);
            }
            None => println!("{}", content),
        }
        Ok(())
    }
}
