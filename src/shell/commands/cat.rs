use anyhow::{Result, anyhow};
use std::fmt::Write as _;

use super::output::print_block;
use super::{Command, ShellState};
use crate::netcdf::{ArrayData, ArrayTable, Attribute, Variable};
use crate::ui::create_spinner;

/// Values printed per variable before the listing is cut short
pub const PREVIEW_VALUES: usize = 10;

pub struct CatCommand;

impl Command for CatCommand {
    fn name(&self) -> &str {
        "cat"
    }

    fn usage(&self) -> &str {
        "cat FILE         - Show the dimensions, attributes and variables of a file"
    }

    fn execute(&self, state: &mut ShellState, args: &[String]) -> Result<()> {
        let path = args.first().ok_or_else(|| anyhow!("Usage: cat FILE"))?;
        let target = state.target_path(path);

        let spinner = create_spinner(&format!("Decoding {target}..."));
        let table = state.resolve_table(path);
        spinner.finish_and_clear();

        let text = render_table(&target.to_string(), &*table?, PREVIEW_VALUES);
        print_block!(text);
        Ok(())
    }
}

/// CDL-style description of a decoded table, in the manner of `ncdump -h`,
/// followed by the first `max_values` values of each variable.
pub fn render_table(name: &str, table: &ArrayTable, max_values: usize) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_table(&mut out, name, table, max_values);
    out
}

fn write_table(
    out: &mut String,
    name: &str,
    table: &ArrayTable,
    max_values: usize,
) -> std::fmt::Result {
    writeln!(out, "netcdf {name} {{")?;

    if !table.dimensions.is_empty() {
        writeln!(out, "dimensions:")?;
        for dim in &table.dimensions {
            if dim.unlimited {
                writeln!(out, "\t{} = UNLIMITED ; // ({} currently)", dim.name, dim.len)?;
            } else {
                writeln!(out, "\t{} = {} ;", dim.name, dim.len)?;
            }
        }
    }

    if !table.variables.is_empty() {
        writeln!(out, "variables:")?;
        for var in &table.variables {
            writeln!(
                out,
                "\t{} {}({}) ;",
                var.data.type_name(),
                var.name,
                var.dimensions.join(", ")
            )?;
            for attr in &var.attributes {
                writeln!(out, "\t\t{}:{} = {} ;", var.name, attr.name, attribute_value(attr))?;
            }
        }
    }

    if !table.attributes.is_empty() {
        writeln!(out)?;
        writeln!(out, "// global attributes:")?;
        for attr in &table.attributes {
            writeln!(out, "\t\t:{} = {} ;", attr.name, attribute_value(attr))?;
        }
    }

    if max_values > 0 && !table.variables.is_empty() {
        writeln!(out, "data:")?;
        for var in &table.variables {
            writeln!(out)?;
            writeln!(out, " {} = {} ;", var.name, preview(var, max_values))?;
        }
    }

    writeln!(out, "}}")
}

fn attribute_value(attr: &Attribute) -> String {
    match attr.as_text() {
        Some(text) => format!("{text:?}"),
        None => join_values(&attr.value, usize::MAX),
    }
}

fn preview(var: &Variable, max_values: usize) -> String {
    if let Some(strings) = var.strings() {
        let shown: Vec<String> = strings
            .iter()
            .take(max_values)
            .map(|s| format!("{s:?}"))
            .collect();
        let more = if strings.len() > max_values { ", ..." } else { "" };
        return format!("{}{more}", shown.join(", "));
    }
    join_values(&var.data, max_values)
}

fn join_values(data: &ArrayData, max_values: usize) -> String {
    let shown: Vec<String> = match data {
        ArrayData::Char(bytes) => return format!("{:?}", String::from_utf8_lossy(bytes)),
        ArrayData::Byte(v) => v.iter().take(max_values).map(|x| x.to_string()).collect(),
        ArrayData::Short(v) => v.iter().take(max_values).map(|x| x.to_string()).collect(),
        ArrayData::Int(v) => v.iter().take(max_values).map(|x| x.to_string()).collect(),
        ArrayData::Float(v) => v.iter().take(max_values).map(|x| x.to_string()).collect(),
        ArrayData::Double(v) => v.iter().take(max_values).map(|x| x.to_string()).collect(),
        ArrayData::UByte(v) => v.iter().take(max_values).map(|x| x.to_string()).collect(),
        ArrayData::UShort(v) => v.iter().take(max_values).map(|x| x.to_string()).collect(),
        ArrayData::UInt(v) => v.iter().take(max_values).map(|x| x.to_string()).collect(),
        ArrayData::Int64(v) => v.iter().take(max_values).map(|x| x.to_string()).collect(),
        ArrayData::UInt64(v) => v.iter().take(max_values).map(|x| x.to_string()).collect(),
    };
    let more = if data.len() > max_values { ", ..." } else { "" };
    format!("{}{more}", shown.join(", "))
}
