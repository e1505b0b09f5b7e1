// UI layer: an interactive menu built on `dialoguer`. Each entry resolves
// a household and tonie by prompting, calls the client and prints the
// result. API errors are reported and the loop continues.

use crate::api::TonieClient;
use crate::credentials::{default_credentials_path, save_credentials};
use crate::error::TonieError;
use crate::models::CreativeTonie;
use crate::output::{
    chapter_row, household_row, print_error, print_json, print_success, print_table,
    print_warning, report_row, tonie_row,
};
use crate::presets::{default_presets_path, run_preset, PresetStore};
use crate::session::Credentials;
use anyhow::Result;
use dialoguer::{Confirm, Input, MultiSelect, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

/// Main interactive menu. Runs until the user picks "Exit".
pub fn main_menu(mut api: TonieClient, json: bool) -> Result<()> {
    let items = [
        "Show account",
        "List households",
        "List Creative Tonies",
        "Show chapters",
        "Upload audio file",
        "Shuffle chapters",
        "Select / reorder chapters",
        "Clear chapters",
        "Rename Creative Tonie",
        "Run preset",
        "Exit",
    ];
    loop {
        let selection = Select::new().items(&items).default(0).interact()?;
        let outcome = match selection {
            0 => show_me(&mut api, json),
            1 => list_households(&mut api, json),
            2 => list_tonies(&mut api, json),
            3 => show_chapters(&mut api, json),
            4 => handle_upload(&mut api, json),
            5 => handle_shuffle(&mut api, json),
            6 => handle_set_chapters(&mut api, json),
            7 => handle_clear(&mut api, json),
            8 => handle_rename(&mut api, json),
            9 => handle_preset(&mut api, json),
            _ => break,
        };
        if let Err(e) = outcome {
            report(&e);
        }
    }
    Ok(())
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<TonieError>() {
        Some(TonieError::RateLimit(d)) => match d.retry_after {
            Some(secs) => print_error(&format!("Rate limited, retry in {secs}s")),
            None => print_error("Rate limited, try again later"),
        },
        Some(TonieError::Authentication(_)) => {
            print_error(&format!("{err}"));
            print_warning("Restart to sign in again.");
        }
        _ => print_error(&format!("{err}")),
    }
}

/// Ask for username and password, offering to remember them on disk.
pub fn prompt_credentials() -> Result<Credentials> {
    let username: String = Input::new().with_prompt("Email").interact_text()?;
    let password: String = Password::new().with_prompt("Password").interact()?;
    let creds = Credentials::new(username, password);

    if let Some(path) = default_credentials_path() {
        let remember = Confirm::new()
            .with_prompt(format!("Remember credentials in {}?", path.display()))
            .default(false)
            .interact()?;
        if remember {
            save_credentials(&path, &creds)?;
        }
    }
    Ok(creds)
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn show_me(api: &mut TonieClient, json: bool) -> Result<()> {
    let user = api.get_me()?;
    if json {
        return print_json(&user);
    }
    println!("UUID:  {}", user.uuid);
    println!("Email: {}", user.email);
    Ok(())
}

fn list_households(api: &mut TonieClient, json: bool) -> Result<()> {
    let households = api.get_households()?;
    if json {
        return print_json(&households);
    }
    if households.is_empty() {
        println!("No households found.");
        return Ok(());
    }
    let rows: Vec<_> = households.iter().map(household_row).collect();
    print_table(&["ID", "Name", "Owner", "Access"], &rows);
    Ok(())
}

fn pick_household(api: &mut TonieClient) -> Result<String> {
    let households = api.get_households()?;
    match households.len() {
        0 => Err(TonieError::not_found("no households found").into()),
        1 => Ok(households[0].id.clone()),
        _ => {
            let names: Vec<String> = households.iter().map(|h| h.name.clone()).collect();
            let idx = Select::new()
                .with_prompt("Household")
                .items(&names)
                .default(0)
                .interact()?;
            Ok(households[idx].id.clone())
        }
    }
}

fn pick_tonie(api: &mut TonieClient) -> Result<(String, CreativeTonie)> {
    let household_id = pick_household(api)?;
    let tonies = api.get_creative_tonies(&household_id)?;
    if tonies.is_empty() {
        return Err(TonieError::not_found("no Creative Tonies in this household").into());
    }
    let names: Vec<String> = tonies
        .iter()
        .map(|t| format!("{} ({} chapters)", t.name, t.chapters_present))
        .collect();
    let idx = Select::new()
        .with_prompt("Creative Tonie")
        .items(&names)
        .default(0)
        .interact()?;
    let tonie = tonies.into_iter().nth(idx).ok_or_else(|| TonieError::not_found("tonie"))?;
    Ok((household_id, tonie))
}

fn list_tonies(api: &mut TonieClient, json: bool) -> Result<()> {
    let household_id = pick_household(api)?;
    let tonies = api.get_creative_tonies(&household_id)?;
    if json {
        return print_json(&tonies);
    }
    if tonies.is_empty() {
        println!("No Creative Tonies found.");
        return Ok(());
    }
    let rows: Vec<_> = tonies.iter().map(tonie_row).collect();
    print_table(&["ID", "Name", "Chapters", "Duration", "Remaining"], &rows);
    Ok(())
}

fn print_tonie(tonie: &CreativeTonie, json: bool) -> Result<()> {
    if json {
        return print_json(tonie);
    }
    let rows: Vec<_> = tonie
        .chapters
        .iter()
        .enumerate()
        .map(|(i, c)| chapter_row(i, c))
        .collect();
    print_table(&["#", "ID", "Title", "Length"], &rows);
    println!(
        "Duration: {:.0}s / Remaining: {:.0}s",
        tonie.seconds_present, tonie.seconds_remaining
    );
    Ok(())
}

fn show_chapters(api: &mut TonieClient, json: bool) -> Result<()> {
    let (_, tonie) = pick_tonie(api)?;
    print_tonie(&tonie, json)
}

fn handle_upload(api: &mut TonieClient, json: bool) -> Result<()> {
    let (household_id, tonie) = pick_tonie(api)?;
    let path: String = Input::new().with_prompt("Audio file path").interact_text()?;
    let path = PathBuf::from(path.trim());
    let title: String = Input::new()
        .with_prompt("Chapter title (empty for file name)")
        .allow_empty(true)
        .interact_text()?;
    let title = Some(title.trim()).filter(|t| !t.is_empty());

    let pb = spinner("Uploading...");
    let result = api.upload_audio_file(&path, &household_id, &tonie.id, title);
    pb.finish_and_clear();
    let updated = result?;

    if json {
        return print_json(&updated);
    }
    print_success(&format!("Uploaded to '{}'", updated.name));
    println!("Total chapters: {}", updated.chapters_present);
    Ok(())
}

fn handle_shuffle(api: &mut TonieClient, json: bool) -> Result<()> {
    let (household_id, tonie) = pick_tonie(api)?;
    let updated = api.shuffle_chapters(&household_id, &tonie.id)?;
    if json {
        return print_json(&updated);
    }
    print_success(&format!(
        "Shuffled {} chapters on '{}'",
        updated.chapters_present, updated.name
    ));
    Ok(())
}

fn handle_set_chapters(api: &mut TonieClient, json: bool) -> Result<()> {
    let (household_id, tonie) = pick_tonie(api)?;
    if tonie.chapters.is_empty() {
        println!("'{}' has no chapters.", tonie.name);
        return Ok(());
    }
    let titles: Vec<String> = tonie.chapters.iter().map(|c| c.title.clone()).collect();
    let defaults = vec![true; titles.len()];
    let keep = MultiSelect::new()
        .with_prompt("Chapters to keep (space toggles)")
        .items(&titles)
        .defaults(&defaults)
        .interact()?;
    let order: String = Input::new()
        .with_prompt("New order as positions, e.g. 3,1,2 (empty keeps order)")
        .allow_empty(true)
        .interact_text()?;

    let mut ids: Vec<String> = keep.iter().map(|&i| tonie.chapters[i].id.clone()).collect();
    if !order.trim().is_empty() {
        ids = parse_order(&order, &ids)?;
    }
    let updated = api.set_chapters(&household_id, &tonie.id, &ids)?;
    print_tonie(&updated, json)
}

/// 1-based positions into `ids`.
fn parse_order(input: &str, ids: &[String]) -> Result<Vec<String>> {
    input
        .split(',')
        .map(|part| -> Result<String> {
            let pos: usize = part
                .trim()
                .parse()
                .map_err(|_| TonieError::validation(format!("not a position: {}", part.trim())))?;
            pos.checked_sub(1)
                .and_then(|i| ids.get(i))
                .cloned()
                .ok_or_else(|| TonieError::validation(format!("position {pos} out of range")).into())
        })
        .collect()
}

fn handle_clear(api: &mut TonieClient, json: bool) -> Result<()> {
    let (household_id, tonie) = pick_tonie(api)?;
    if tonie.chapters_present == 0 {
        println!("'{}' has no chapters to clear.", tonie.name);
        return Ok(());
    }
    let confirmed = Confirm::new()
        .with_prompt(format!(
            "Clear {} chapters from '{}'?",
            tonie.chapters_present, tonie.name
        ))
        .default(false)
        .interact()?;
    if !confirmed {
        return Ok(());
    }
    let updated = api.clear_chapters(&household_id, &tonie.id)?;
    if json {
        return print_json(&updated);
    }
    print_success(&format!("Cleared all chapters from '{}'", updated.name));
    Ok(())
}

fn handle_rename(api: &mut TonieClient, json: bool) -> Result<()> {
    let (household_id, tonie) = pick_tonie(api)?;
    let name: String = Input::new()
        .with_prompt("New name")
        .with_initial_text(tonie.name.clone())
        .interact_text()?;
    let updated = api.rename_creative_tonie(&household_id, &tonie.id, name.trim())?;
    if json {
        return print_json(&updated);
    }
    print_success(&format!("Renamed to '{}'", updated.name));
    Ok(())
}

fn handle_preset(api: &mut TonieClient, json: bool) -> Result<()> {
    let Some(path) = default_presets_path() else {
        print_warning("No config directory; presets are unavailable.");
        return Ok(());
    };
    let store = PresetStore::new(path);
    let presets = store.load()?;
    if presets.is_empty() {
        println!("No presets in {}.", store.path().display());
        return Ok(());
    }
    let names: Vec<&String> = presets.keys().collect();
    let labels: Vec<String> = presets
        .iter()
        .map(|(name, p)| match p.description.as_str() {
            "" => name.clone(),
            d => format!("{name}: {d}"),
        })
        .collect();
    let idx = Select::new()
        .with_prompt("Preset")
        .items(&labels)
        .default(0)
        .interact()?;
    let preset = &presets[names[idx]];

    let pb = spinner("Running preset...");
    let result = run_preset(api, preset);
    pb.finish_and_clear();
    let reports = result?;

    if json {
        return print_json(&reports);
    }
    let rows: Vec<_> = reports.iter().map(report_row).collect();
    print_table(&["Action", "Target", "Status", "Result"], &rows);
    let failed = reports.iter().filter(|r| !r.is_success()).count();
    if failed == 0 {
        print_success(&format!("Preset '{}' completed", names[idx]));
    } else {
        print_warning(&format!("{failed} of {} actions failed", reports.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_order_maps_positions() {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(parse_order("3, 1", &ids).unwrap(), ["c", "a"]);
        assert!(parse_order("0", &ids).is_err());
        assert!(parse_order("4", &ids).is_err());
        assert!(parse_order("x", &ids).is_err());
    }
}
