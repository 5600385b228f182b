use std::{
    env,
    io::{self, Write},
    path::PathBuf,
    process::{Command, Stdio},
    time::Duration,
};

use anyhow::{anyhow, bail, Context};
use chrono::{Datelike, Local, NaiveDate};

use shared_calendar::{
    calendar::{event::format_time, Category, EventForm, EventRecord},
    export::CalendarMeta,
    storage::{config::Config, BackendKind},
    sync::SyncCoordinator,
    ui::month_view::{format_time_12h, shift_month, MonthView},
};

pub const USAGE: &str = "\
Usage: shared-calendar [COMMAND]

Commands:
  month [YYYY-MM] [next|prev|+N|-N]
                           Show the month grid (default: current month)
  day [YYYY-MM-DD]         List events on a day (default: today)
  add --title T [FLAGS]    Create an event (default date: today)
  edit ID [FLAGS]          Replace an event, keeping unspecified fields
  remove ID                Delete an event
  export [PATH]            Write all events to an .ics file
  watch                    Print every change from the cloud store
  categories               List event categories

Event flags:
  --title T  --date YYYY-MM-DD  --time HH:MM  --end-date YYYY-MM-DD
  --end-time HH:MM  --category C  --location L  --description D";

const FIRST_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Month {
        anchor: Option<NaiveDate>,
        offset: i32,
    },
    Day(Option<NaiveDate>),
    Add(FormFlags),
    Edit { id: String, flags: FormFlags },
    Remove(String),
    Export(Option<PathBuf>),
    Watch,
    Categories,
    Help,
}

/// Event fields given on the command line. Unset fields keep the form's value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormFlags {
    pub title: Option<String>,
    pub start_date: Option<String>,
    pub start_time: Option<String>,
    pub end_date: Option<String>,
    pub end_time: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

impl FormFlags {
    pub fn apply(&self, form: &mut EventForm) {
        let fields = [
            (&self.title, &mut form.title),
            (&self.start_date, &mut form.start_date),
            (&self.start_time, &mut form.start_time),
            (&self.end_date, &mut form.end_date),
            (&self.end_time, &mut form.end_time),
            (&self.category, &mut form.category),
            (&self.location, &mut form.location),
            (&self.description, &mut form.description),
        ];
        for (flag, field) in fields {
            if let Some(value) = flag {
                *field = value.clone();
            }
        }
    }
}

pub fn parse_cli_command<I>(args: I) -> Result<CliCommand, String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();

    let Some(command) = args.next() else {
        return Ok(CliCommand::Month {
            anchor: None,
            offset: 0,
        });
    };

    match command.as_str() {
        "month" => {
            let mut anchor = None;
            let mut offset = 0;
            for value in args {
                match value.as_str() {
                    "next" => offset += 1,
                    "prev" => offset -= 1,
                    v if v.starts_with('+') || v.starts_with('-') => offset += parse_offset(v)?,
                    v => anchor = Some(parse_month(v)?),
                }
            }
            Ok(CliCommand::Month { anchor, offset })
        }
        "day" => {
            let date = args.next().map(|value| parse_day(&value)).transpose()?;
            Ok(CliCommand::Day(date))
        }
        "add" => {
            let flags = parse_form_flags(args)?;
            if flags.title.is_none() {
                return Err("add needs at least --title".to_string());
            }
            Ok(CliCommand::Add(flags))
        }
        "edit" => {
            let id = args.next().ok_or("edit needs an event id")?;
            let flags = parse_form_flags(args)?;
            Ok(CliCommand::Edit { id, flags })
        }
        "remove" => {
            let id = args.next().ok_or("remove needs an event id")?;
            Ok(CliCommand::Remove(id))
        }
        "export" => Ok(CliCommand::Export(args.next().map(PathBuf::from))),
        "watch" => Ok(CliCommand::Watch),
        "categories" => Ok(CliCommand::Categories),
        "--help" | "-h" | "help" => Ok(CliCommand::Help),
        _ => Err(format!("Unknown command: {}", command)),
    }
}

fn parse_form_flags(mut args: impl Iterator<Item = String>) -> Result<FormFlags, String> {
    let mut flags = FormFlags::default();

    while let Some(flag) = args.next() {
        let slot = match flag.as_str() {
            "--title" => &mut flags.title,
            "--date" => &mut flags.start_date,
            "--time" => &mut flags.start_time,
            "--end-date" => &mut flags.end_date,
            "--end-time" => &mut flags.end_time,
            "--category" => &mut flags.category,
            "--location" => &mut flags.location,
            "--description" => &mut flags.description,
            _ => return Err(format!("Unknown argument: {}", flag)),
        };
        let value = args
            .next()
            .ok_or_else(|| format!("{} needs a value", flag))?;
        *slot = Some(value);
    }

    Ok(flags)
}

fn parse_month(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d")
        .map_err(|_| format!("Invalid month '{}'. Use YYYY-MM.", value))
}

fn parse_offset(value: &str) -> Result<i32, String> {
    value
        .parse::<i32>()
        .map_err(|_| format!("Invalid month offset '{}'. Use +N or -N.", value))
}

fn parse_day(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}'. Use YYYY-MM-DD.", value))
}

pub async fn run(command: CliCommand, config: &Config) -> anyhow::Result<()> {
    match command {
        CliCommand::Help => {
            println!("{USAGE}");
            return Ok(());
        }
        CliCommand::Categories => {
            println!("{}", format_categories());
            return Ok(());
        }
        _ => {}
    }

    let mut coordinator = SyncCoordinator::initialize(config)
        .await
        .context("Failed to open calendar storage")?;
    eprintln!("{}", coordinator.status());

    if coordinator.backend_kind() == BackendKind::Remote
        && !matches!(command, CliCommand::Add(_) | CliCommand::Remove(_))
    {
        wait_for_first_snapshot(&mut coordinator).await?;
    }

    let today = Local::now().date_naive();

    match command {
        CliCommand::Month { anchor, offset } => {
            let anchor = shift_month(anchor.unwrap_or(today), offset);
            let view = coordinator.month_view(anchor, today);
            display_with_pager(&format_month_text(&view))?;
        }
        CliCommand::Day(date) => {
            let date = date.unwrap_or(today);
            let events = coordinator.events_on(date);
            display_with_pager(&format_agenda_text(date, &events))?;
        }
        CliCommand::Add(flags) => {
            let mut form = EventForm::new(today);
            flags.apply(&mut form);
            let record = EventRecord::from_form(&form)?;
            let id = record.id.clone();
            coordinator.save(record).await?;
            println!("Saved event {}", id);
        }
        CliCommand::Edit { id, flags } => {
            let existing = coordinator
                .find(&id)
                .ok_or_else(|| anyhow!("No event with id {}", id))?;
            let mut form = EventForm::for_record(existing);
            flags.apply(&mut form);
            let record = EventRecord::from_form(&form)?;
            coordinator.save(record).await?;
            println!("Updated event {}", id);
        }
        CliCommand::Remove(id) => {
            if coordinator.backend_kind() == BackendKind::Local && coordinator.find(&id).is_none() {
                println!("No event with id {}, nothing removed", id);
                return Ok(());
            }
            coordinator.remove(&id).await?;
            println!("Removed event {}", id);
        }
        CliCommand::Export(path) => {
            let path = path.unwrap_or_else(|| PathBuf::from(&config.export.file_name));
            let ics = coordinator.export_ics(&CalendarMeta::from(&config.export));
            std::fs::write(&path, ics)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Exported {} events to {}", coordinator.events().len(), path.display());
            println!("Calendar exported to {} ✓", path.display());
        }
        CliCommand::Watch => watch(&mut coordinator).await?,
        CliCommand::Help | CliCommand::Categories => unreachable!("handled before storage is opened"),
    }

    eprintln!("{}", coordinator.status());
    Ok(())
}

async fn wait_for_first_snapshot(coordinator: &mut SyncCoordinator) -> anyhow::Result<()> {
    match tokio::time::timeout(FIRST_SNAPSHOT_TIMEOUT, coordinator.next_change()).await {
        Ok(true) => Ok(()),
        Ok(false) => bail!("Cloud change feed closed before any data arrived"),
        Err(_) => bail!("Timed out waiting for cloud data"),
    }
}

async fn watch(coordinator: &mut SyncCoordinator) -> anyhow::Result<()> {
    if coordinator.backend_kind() == BackendKind::Local {
        bail!("watch needs the cloud backend; local storage has no change feed");
    }

    println!("{} — {} events", coordinator.status(), coordinator.events().len());
    loop {
        tokio::select! {
            changed = coordinator.next_change() => {
                if !changed {
                    return Ok(());
                }
                println!("{} — {} events", coordinator.status(), coordinator.events().len());
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

fn format_categories() -> String {
    Category::ALL
        .iter()
        .map(|category| {
            format!(
                "{} {:<12} {:<12} {}",
                category.glyph(),
                category.key(),
                category.label(),
                category.color()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_month_text(view: &MonthView) -> String {
    let mut lines = vec![view.title.clone(), String::new()];
    lines.push(" Sun Mon Tue Wed Thu Fri Sat".to_string());

    for week in &view.weeks {
        let row: String = week
            .days
            .iter()
            .map(|cell| match cell.date {
                Some(date) => {
                    let marker = if cell.is_today {
                        '#'
                    } else if cell.has_events() {
                        '*'
                    } else {
                        ' '
                    };
                    format!(" {:>2}{}", date.day(), marker)
                }
                None => "    ".to_string(),
            })
            .collect();
        lines.push(row);
    }

    lines.push(String::new());
    for cell in view.weeks.iter().flat_map(|week| &week.days) {
        let Some(date) = cell.date else { continue };
        for chip in &cell.events {
            let time = chip.time_label.as_deref().unwrap_or("All Day");
            lines.push(format!(
                "{} {} {:<8} {} [{}]",
                date.format("%a %d"),
                chip.glyph,
                time,
                chip.title,
                chip.id
            ));
        }
    }

    lines.join("\n")
}

fn format_agenda_text(date: NaiveDate, events: &[&EventRecord]) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Agenda – {}", date.format("%A, %B %d, %Y")));
    lines.push(String::new());

    if events.is_empty() {
        lines.push("No events scheduled.".to_string());
    } else {
        for event in events {
            lines.push(format!("- {}", build_agenda_line(event)));
            if let Some(description) = &event.description {
                for line in description.lines() {
                    lines.push(format!("    {}", line));
                }
            }
        }
    }

    lines.join("\n")
}

fn build_agenda_line(event: &EventRecord) -> String {
    let time_label = match (event.start_time, event.effective_end_time()) {
        (Some(start), Some(end)) if end != start => {
            format!("{}-{}", format_time(start), format_time(end))
        }
        (Some(start), _) => format_time_12h(start),
        (None, _) => "All Day".to_string(),
    };

    let mut line = format!("{:<13} {} {}", time_label, event.glyph(), event.title);
    if event.spans_multiple_days() {
        line.push_str(&format!(
            " ({} – {})",
            event.start_date.format("%b %d"),
            event.end_date.format("%b %d")
        ));
    }
    if let Some(location) = &event.location {
        line.push_str(&format!(" @ {}", location));
    }
    line.push_str(&format!(" [{}]", event.id));
    line
}

fn display_with_pager(text: &str) -> Result<(), io::Error> {
    let pager_value = env::var("PAGER").unwrap_or_else(|_| "less".to_string());
    let mut parts = pager_value.split_whitespace();
    let cmd = match parts.next() {
        Some(c) => c,
        None => {
            println!("{text}");
            return Ok(());
        }
    };
    let args: Vec<&str> = parts.collect();

    match Command::new(cmd)
        .args(&args)
        .stdin(Stdio::piped())
        .spawn()
    {
        Ok(mut child) => {
            if let Some(stdin) = child.stdin.as_mut() {
                stdin.write_all(text.as_bytes())?;
            }
            let _ = child.wait();
        }
        Err(_) => {
            println!("{text}");
        }
    }

    Ok(())
}
