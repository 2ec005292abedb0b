use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use serde_json::json;

use crate::cli_context::CliContext;
use crate::cli_format::{format_delimited_row, value_to_cell, OutputFormat};
use quarry::format::{format_bytes, format_compact, format_duration_ms, format_number};
use quarry::{EngineSession, QuarryError, QueryResult, Result, ShareLink};

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| QuarryError::Io(format!("Failed to encode JSON: {}", e)))
}

/// `quarry tables`
pub(crate) async fn list_tables(session: &EngineSession, ctx: &CliContext) -> Result<()> {
    let tables = session.get_available_tables().await;
    let metadata = session.metadata().await;

    match ctx.format {
        OutputFormat::Json => {
            let entries: Vec<_> = tables
                .iter()
                .map(|name| {
                    let meta = metadata.tables.get(name);
                    json!({
                        "table": name,
                        "rows": meta.map(|m| m.rows),
                        "bytes": meta.map(|m| m.bytes),
                        "min_date": meta.and_then(|m| m.min_date.clone()),
                        "max_date": meta.and_then(|m| m.max_date.clone()),
                    })
                })
                .collect();
            println!("{}", to_json(&entries)?);
        }
        format if format.is_delimited() => {
            let header: Vec<String> = ["table", "rows", "bytes"].iter().map(|s| s.to_string()).collect();
            println!("{}", format_delimited_row(format, &header));
            for name in &tables {
                let meta = metadata.tables.get(name);
                let fields = vec![
                    name.clone(),
                    meta.map(|m| m.rows.to_string()).unwrap_or_default(),
                    meta.map(|m| m.bytes.to_string()).unwrap_or_default(),
                ];
                println!("{}", format_delimited_row(format, &fields));
            }
        }
        _ => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL_CONDENSED);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec![
                Cell::new("Table").fg(Color::Cyan),
                Cell::new("Rows").fg(Color::Cyan),
                Cell::new("Size").fg(Color::Cyan),
                Cell::new("Dates").fg(Color::Cyan),
            ]);

            for name in &tables {
                match metadata.tables.get(name) {
                    Some(meta) => {
                        let dates = meta
                            .date_range()
                            .map(|(min, max)| format!("{} .. {}", min, max))
                            .unwrap_or_else(|| "-".to_string());
                        table.add_row(vec![
                            Cell::new(name),
                            Cell::new(format_compact(meta.rows as f64)),
                            Cell::new(format_bytes(meta.bytes)),
                            Cell::new(dates),
                        ]);
                    }
                    None => {
                        table.add_row(vec![
                            Cell::new(name),
                            Cell::new("-").fg(Color::DarkGrey),
                            Cell::new("-").fg(Color::DarkGrey),
                            Cell::new("-").fg(Color::DarkGrey),
                        ]);
                    }
                }
            }

            println!("{table}");
            if metadata.total_bytes > 0 {
                ctx.info(&format!(
                    "{} from {}",
                    format_bytes(metadata.total_bytes),
                    metadata.source
                ));
            } else {
                ctx.warn("Dataset manifest unavailable; listing the built-in catalog");
            }
        }
    }
    Ok(())
}

/// Load `tables`, showing progress
async fn ensure_with_progress(
    session: &EngineSession,
    ctx: &CliContext,
    tables: &[String],
) -> Result<()> {
    let progress = ctx.track_loads(session);
    let result = session.ensure_tables(tables).await;
    if let Some(progress) = progress {
        progress.finish();
    }
    result
}

/// `quarry load <tables...>`
pub(crate) async fn load_tables(
    session: &EngineSession,
    ctx: &CliContext,
    tables: &[String],
) -> Result<()> {
    ensure_with_progress(session, ctx, tables).await?;

    let state = session.state();
    if ctx.format == OutputFormat::Json {
        println!("{}", to_json(&*state)?);
    } else {
        ctx.success(&format!(
            "Loaded {} ({} downloaded)",
            state.loaded_tables.join(", "),
            format_bytes(state.loaded_bytes)
        ));
    }
    Ok(())
}

/// `quarry query <sql>`
pub(crate) async fn run_query(
    session: &EngineSession,
    ctx: &CliContext,
    sql: &str,
    tables: &[String],
) -> Result<()> {
    let tables = if tables.is_empty() {
        session.get_available_tables().await
    } else {
        tables.to_vec()
    };
    ensure_with_progress(session, ctx, &tables).await?;

    let result = session.run_query(sql).await?;
    print_result(ctx, &result)?;
    Ok(())
}

fn print_result(ctx: &CliContext, result: &QueryResult) -> Result<()> {
    match ctx.format {
        OutputFormat::Json => {
            println!("{}", to_json(result)?);
            return Ok(());
        }
        format if format.is_delimited() => {
            println!("{}", format_delimited_row(format, &result.columns));
            for i in 0..result.row_count {
                let fields: Vec<String> = result.row_values(i).iter().map(value_to_cell).collect();
                println!("{}", format_delimited_row(format, &fields));
            }
            return Ok(());
        }
        _ => {}
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        result
            .columns
            .iter()
            .map(|c| Cell::new(c).fg(Color::Cyan))
            .collect::<Vec<_>>(),
    );
    for i in 0..result.row_count {
        table.add_row(
            result
                .row_values(i)
                .iter()
                .map(|v| Cell::new(value_to_cell(v)))
                .collect::<Vec<_>>(),
        );
    }
    println!("{table}");

    let mut summary = format!(
        "{} rows in {}",
        format_number(result.row_count as f64),
        format_duration_ms(result.elapsed_ms)
    );
    if let Some(memory) = result.memory_bytes {
        summary.push_str(&format!(", engine memory {}", format_bytes(memory)));
    }
    ctx.info(&summary);
    Ok(())
}

/// `quarry share <tab> <sql>`
pub(crate) fn share(ctx: &CliContext, tab: &str, sql: &str, page: Option<&str>) -> Result<()> {
    let link = ShareLink::new(tab, sql);
    let rendered = match page {
        Some(page) => link.to_url(page),
        None => link.to_fragment(None),
    };
    if ctx.format == OutputFormat::Json {
        println!("{}", to_json(&json!({ "link": rendered, "tab": tab, "query": sql }))?);
    } else {
        println!("{}", rendered);
    }
    Ok(())
}

/// `quarry open <fragment>`
pub(crate) fn open(ctx: &CliContext, fragment: &str) -> Result<()> {
    let link = ShareLink::parse(fragment);
    if ctx.format == OutputFormat::Json {
        println!("{}", to_json(&link)?);
        return Ok(());
    }
    match (&link.tab, &link.query) {
        (None, None) => ctx.warn("No tab or query in link"),
        (tab, query) => {
            if let Some(tab) = tab {
                println!("tab:   {}", tab);
            }
            if let Some(query) = query {
                println!("query: {}", query);
            }
        }
    }
    Ok(())
}
