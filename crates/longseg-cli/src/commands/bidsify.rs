use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;
use tracing::warn;

/// Raw scanner filename -> BIDS modality label.
const MODALITIES: [(&str, &str); 3] = [("t1.nii", "T1w"), ("t2.nii", "T2w"), ("f2.nii", "FLAIR")];

#[derive(Args)]
pub struct BidsifyArgs {
    /// Folder of the raw database (one directory per patient, one per visit)
    #[arg(short = 'i', long = "input_directory")]
    pub input_directory: PathBuf,

    /// Destination folder for the BIDS database
    #[arg(short = 'o', long = "output_directory")]
    pub output_directory: PathBuf,
}

pub fn run(args: &BidsifyArgs) -> Result<()> {
    let raw_name = args
        .input_directory
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Input directory has no name")?;
    let bids_root = args.output_directory.join(format!("{raw_name}_bids"));
    fs::create_dir_all(&bids_root)?;

    let mut patients: Vec<PathBuf> = fs::read_dir(&args.input_directory)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    patients.sort();

    for patient in &patients {
        let patient_id = patient
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let subject_dir = bids_root.join(format!("sub-{patient_id}"));
        fs::create_dir_all(&subject_dir)?;

        let mut visits: Vec<PathBuf> = fs::read_dir(patient)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        visits.sort();

        for visit in &visits {
            // Visit directories are dated; the session ID is the date with
            // separators removed.
            let session_id = visit
                .file_name()
                .map(|n| n.to_string_lossy().replace('-', ""))
                .unwrap_or_default();
            let anat = subject_dir.join(format!("ses-{session_id}")).join("anat");
            fs::create_dir_all(&anat)?;

            for (raw_file, label) in MODALITIES {
                let raw = visit.join(raw_file);
                if !raw.exists() {
                    warn!(path = %raw.display(), "raw scan missing, skipping");
                    continue;
                }
                let bids = anat.join(format!(
                    "sub-{patient_id}_ses-{session_id}_{label}.nii.gz"
                ));
                gzip_copy(&raw, &bids)
                    .with_context(|| format!("Failed to compress {}", raw.display()))?;
            }
        }
    }

    write_dataset_files(&bids_root, &raw_name)?;
    println!(
        "Converted {} patient(s) into {}",
        patients.len(),
        bids_root.display()
    );
    Ok(())
}

fn gzip_copy(src: &Path, dest: &Path) -> Result<()> {
    let mut reader = File::open(src)?;
    let mut encoder = GzEncoder::new(File::create(dest)?, Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?;
    Ok(())
}

fn write_dataset_files(bids_root: &Path, name: &str) -> Result<()> {
    let description = json!({
        "Name": name,
        "BIDSVersion": "1.7.0",
        "DatasetType": "raw",
        "License": "CC0",
        "GeneratedBy": [{
            "Name": "longseg",
            "Version": env!("CARGO_PKG_VERSION"),
        }],
    });
    let mut file = File::create(bids_root.join("dataset_description.json"))?;
    file.write_all(serde_json::to_string_pretty(&description)?.as_bytes())?;

    for stub in ["README", "LICENSE", "participants.tsv", "participants.json"] {
        let path = bids_root.join(stub);
        if !path.exists() {
            File::create(path)?;
        }
    }
    Ok(())
}
