use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use dwiflow_core::layout::SessionLayout;
use dwiflow_core::selector::select_sequences;
use dwiflow_core::sequence::{discover_session, AcquiredSequence};
use dwiflow_core::sidecar::read_acquisition_params;

#[derive(Args)]
pub struct InfoArgs {
    /// BIDS dataset root
    pub bids_root: PathBuf,
    /// Subject identifier (with or without `sub-`)
    pub subject: String,
    /// Session identifier (with or without `ses-`)
    pub session: String,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let layout = SessionLayout::new(&args.bids_root, &args.subject, &args.session);
    let sequences = discover_session(&layout.session_dir())?;

    println!("Session:     {}", layout.session_dir().display());
    println!("Sequences:   {}", sequences.len());
    for seq in &sequences {
        println!(
            "  {:<8} {}{}{}",
            seq.modality.to_string(),
            seq.file_name(),
            if seq.gradient.is_some() { "  [bvec/bval]" } else { "" },
            if seq.sidecar.is_some() { "  [json]" } else { "" },
        );
    }
    println!();

    let selection = match select_sequences(&sequences) {
        Ok(selection) => selection,
        Err(e) => {
            println!("Selection:   {}", e);
            return Ok(());
        }
    };

    let name = |seq: Option<&AcquiredSequence>| {
        seq.map(|s| s.file_name()).unwrap_or_else(|| "none".into())
    };
    println!("DWI:         {}", selection.dwi.file_name());
    println!("Anatomical:  {}", name(selection.anatomical.as_ref()));
    if selection.flair_promoted() {
        println!("             (FLAIR promoted, no T1w found)");
    }
    println!("Auxiliary:   {}", name(selection.auxiliary.as_ref()));
    println!("Pepolar:     {}", name(selection.pepolar.as_ref()));

    match read_acquisition_params(&selection.dwi.sidecar_path()) {
        Ok(params) => {
            println!("Readout:     {} s", params.readout_time);
            println!("PE dir:      {}", params.phase_encoding_direction);
        }
        Err(e) => println!("Sidecar:     {}", e),
    }

    Ok(())
}
