//! Summaries of FCDR files for the `inspect` command.
use error_stack::ResultExt;
use fcdr_rs::dataset::{AttrValue, DataType, Dataset};
use fcdr_rs::reader::FcdrReader;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::Serialize;
use tabled::settings::{Alignment, Style};
use tabled::{Table, Tabled};

use crate::cli::InspectCli;
use crate::errors::CliError;

pub(crate) fn inspect(cli: InspectCli) -> error_stack::Result<(), CliError> {
    let mut ds = FcdrReader::open(&cli.file)
        .change_context_lazy(|| CliError::input_error(format!("could not read {}", cli.file.display())))?;
    if cli.load_virtual {
        ds.load_all()
            .change_context_lazy(|| CliError::input_error("could not evaluate the virtual variables"))?;
    }

    let summary = DatasetSummary::from(&ds);
    if cli.json {
        let s = serde_json::to_string_pretty(&summary)
            .change_context_lazy(|| CliError::internal_error("could not serialize the summary to JSON"))?;
        println!("{s}");
    } else {
        println!("{}", summary.to_tables());
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct DatasetSummary {
    dimensions: IndexMap<String, usize>,
    attributes: IndexMap<String, AttrValue>,
    variables: IndexMap<String, VariableSummary>,
}

#[derive(Debug, Serialize)]
struct VariableSummary {
    dtype: DataType,
    dimensions: Vec<String>,
    shape: Vec<usize>,
    #[serde(rename = "virtual")]
    is_virtual: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    expression: Option<String>,
    attributes: IndexMap<String, AttrValue>,
}

#[derive(Tabled)]
struct VariableRow<'a> {
    name: &'a str,
    dtype: String,
    dimensions: String,
    shape: String,
    #[tabled(rename = "virtual")]
    is_virtual: &'static str,
}

#[derive(Tabled)]
struct AttributeRow<'a> {
    attribute: &'a str,
    value: String,
}

impl From<&Dataset> for DatasetSummary {
    fn from(ds: &Dataset) -> Self {
        let variables = ds
            .variables()
            .map(|(name, var)| {
                let summary = VariableSummary {
                    dtype: var.dtype(),
                    dimensions: var.dims().to_vec(),
                    shape: var.shape().to_vec(),
                    is_virtual: var.is_virtual(),
                    expression: var.attr("expression").and_then(|e| e.as_str()).map(|e| e.to_string()),
                    attributes: var.attrs().clone(),
                };
                (name.to_string(), summary)
            })
            .collect();
        Self { dimensions: ds.dimensions(), attributes: ds.attrs().clone(), variables }
    }
}

impl DatasetSummary {
    fn to_tables(&self) -> String {
        let dims = self.dimensions.iter().map(|(name, len)| format!("{name} = {len}")).join(", ");

        let var_rows = self.variables.iter().map(|(name, var)| VariableRow {
            name,
            dtype: var.dtype.to_string(),
            dimensions: var.dimensions.join(", "),
            shape: format!("({})", var.shape.iter().join(", ")),
            is_virtual: if var.is_virtual { "yes" } else { "" },
        });
        let mut var_table = Table::new(var_rows);
        var_table.with(Style::blank()).with(Alignment::left());

        let attr_rows = self.attributes.iter().map(|(name, value)| AttributeRow {
            attribute: name,
            value: format_attribute(value),
        });
        let mut attr_table = Table::new(attr_rows);
        attr_table.with(Style::blank()).with(Alignment::left());

        format!("Dimensions: {dims}\n\nVariables:\n{var_table}\n\nGlobal attributes:\n{attr_table}")
    }
}

fn format_attribute(value: &AttrValue) -> String {
    const MAX_WIDTH: usize = 60;
    let s = match value {
        AttrValue::Str(s) => s.clone(),
        AttrValue::F64s(v) => format!("[{}]", v.iter().join(", ")),
        AttrValue::I32s(v) => format!("[{}]", v.iter().join(", ")),
        other => other.as_f64().map(|v| v.to_string()).unwrap_or_default(),
    };
    if s.chars().count() > MAX_WIDTH {
        let truncated: String = s.chars().take(MAX_WIDTH - 3).collect();
        format!("{truncated}...")
    } else {
        s
    }
}
