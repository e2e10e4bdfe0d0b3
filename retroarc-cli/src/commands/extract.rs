//! `retroarc extract` - unpack entries to a directory.

use std::fs;
use std::path::Path;

use dialoguer::Confirm;
use indicatif::ProgressBar;

use retroarc_core::archive::Archive;
use retroarc_core::stream::ReadStream;

use super::{CliResult, compile_patterns, entry_display_name, matches_patterns, open_archive};

#[allow(clippy::too_many_arguments)]
pub fn cmd_extract(
    path: &Path,
    format: Option<&str>,
    output: &Path,
    include: &[String],
    exclude: &[String],
    raw: bool,
    prompt: bool,
    progress: bool,
) -> CliResult {
    let include = compile_patterns(include)?;
    let exclude = compile_patterns(exclude)?;
    let (mut archive, _) = open_archive(path, format)?;

    fs::create_dir_all(output)?;

    let files = archive.files();
    let selected: Vec<_> = files
        .iter()
        .enumerate()
        .filter(|(i, h)| {
            let name = entry_display_name(&h.borrow().name, *i);
            matches_patterns(&name, &include, &exclude)
        })
        .collect();

    let bar = if progress {
        Some(ProgressBar::new(selected.len() as u64))
    } else {
        None
    };

    let mut extracted = 0usize;
    for (i, handle) in selected {
        let name = entry_display_name(&handle.borrow().name, i);
        let target = output.join(&name);

        if target.exists() && prompt {
            let overwrite = Confirm::new()
                .with_prompt(format!("overwrite {}?", target.display()))
                .default(false)
                .interact()?;
            if !overwrite {
                if let Some(bar) = &bar {
                    bar.inc(1);
                }
                continue;
            }
        }

        let mut stream = archive.open(handle, !raw)?;
        let data = stream.read_to_end()?;
        fs::write(&target, data)?;
        extracted += 1;
        if let Some(bar) = &bar {
            bar.inc(1);
        }
    }
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    println!("extracted {} file(s) to {}", extracted, output.display());
    Ok(())
}
