use std::path::PathBuf;
use std::process::Command;

use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use tempfile::TempDir;

use crate::errors::*;
use crate::io::{FastaWriter, FastxInput};

lazy_static! {
    static ref AMPLICON_HEADER: Regex =
        Regex::new(r"^SEQ(\d+);size=(\d+);(?:.*;)?amptype=([A-Za-z0-9_]+);?").unwrap();
}

/// A distinct sequence offered to the denoiser, with its read support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub sequence: Vec<u8>,
    pub count: u64,
}

/// Separates real amplicons from noise and chimeras.
pub trait Denoiser {
    /// Indices into `candidates` of the sequences kept as real amplicons,
    /// in ascending order.
    fn denoise(&self, candidates: &[Candidate]) -> Result<Vec<usize>>;
}

/// Keeps every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepAll;

impl Denoiser for KeepAll {
    fn denoise(&self, candidates: &[Candidate]) -> Result<Vec<usize>> {
        Ok((0..candidates.len()).collect())
    }
}

/// A parsed `SEQn;size=c;amptype=t` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmpliconHeader {
    pub id: usize,
    pub size: u64,
    pub amptype: String,
}

impl AmpliconHeader {
    pub fn parse(header: &str) -> Option<Self> {
        let caps = AMPLICON_HEADER.captures(header)?;
        Some(Self {
            id: caps[1].parse().ok()?,
            size: caps[2].parse().ok()?,
            amptype: caps[3].to_owned(),
        })
    }

    pub fn is_amplicon(&self) -> bool {
        self.amptype == "otu"
    }
}

/// Runs a UNOISE-style external denoiser.
///
/// Candidates are written as `>SEQn;size=c;` with `n` counting from 1. The tool
/// is expected to write every input sequence to its amplicon output tagged with
/// `amptype=`; only `otu` entries are kept.
pub struct UnoiseCommand {
    program: String,
    args: Vec<String>,
    min_size: u64,
    workdir: TempDir,
}

impl UnoiseCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>, min_size: u64) -> Result<Self> {
        let workdir = tempfile::Builder::new()
            .prefix("ampliplex-denoise")
            .tempdir()
            .map_err(|e| Error::BytesIo(Box::new(e)))?;

        Ok(Self {
            program: program.into(),
            args,
            min_size,
            workdir,
        })
    }

    fn input_path(&self) -> PathBuf {
        self.workdir.path().join("candidates.fa")
    }

    fn output_path(&self) -> PathBuf {
        self.workdir.path().join("amplicons.fa")
    }

    // leftovers from the previous partition must never be read back
    fn clear(&self) -> Result<()> {
        for file in [self.input_path(), self.output_path()] {
            if file.exists() {
                std::fs::remove_file(&file).map_err(|e| Error::file_io(&file, e))?;
            }
        }
        Ok(())
    }

    fn write_candidates(&self, candidates: &[Candidate]) -> Result<()> {
        let mut writer = FastaWriter::to_file(self.input_path())?;
        for (i, c) in candidates.iter().enumerate() {
            let name = format!("SEQ{};size={};", i + 1, c.count);
            writer.write_record(name.as_bytes(), &c.sequence)?;
        }
        writer.finish()
    }

    fn read_amplicons(&self, n: usize) -> Result<Vec<usize>> {
        let mut kept = Vec::new();

        let output = self.output_path();
        let len = std::fs::metadata(&output)
            .map_err(|e| Error::file_io(&output, e))?
            .len();
        if len == 0 {
            return Ok(kept);
        }

        for record in FastxInput::from_file(&output)? {
            let header = utf8(&record?.id);
            let parsed = AmpliconHeader::parse(&header)
                .filter(|h| (1..=n).contains(&h.id))
                .ok_or_else(|| Error::UnknownSyntheticId(header.clone()))?;

            if parsed.is_amplicon() {
                kept.push(parsed.id - 1);
            }
        }

        kept.sort_unstable();
        kept.dedup();
        Ok(kept)
    }
}

impl Denoiser for UnoiseCommand {
    fn denoise(&self, candidates: &[Candidate]) -> Result<Vec<usize>> {
        self.clear()?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        self.write_candidates(candidates)?;

        let mut cmd = Command::new(&self.program);
        cmd.arg("-unoise3")
            .arg(self.input_path())
            .arg("-ampout")
            .arg(self.output_path())
            .arg("-minsize")
            .arg(self.min_size.to_string())
            .args(&self.args);
        debug!("Running {cmd:?}");

        let output = cmd.output().map_err(|source| Error::ToolSpawn {
            program: self.program.clone(),
            source,
        })?;
        if !output.status.success() {
            debug!("{}", String::from_utf8_lossy(&output.stderr));
            return Err(Error::ToolFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
            });
        }

        let kept = self.read_amplicons(candidates.len())?;
        info!(
            "{} kept {} of {} candidate sequences",
            self.program,
            kept.len(),
            candidates.len()
        );
        self.clear()?;
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_amplicon_headers() {
        let h = AmpliconHeader::parse("SEQ12;size=40;amptype=otu;").unwrap();
        assert_eq!(h.id, 12);
        assert_eq!(h.size, 40);
        assert!(h.is_amplicon());

        let h = AmpliconHeader::parse("SEQ3;size=2;uparseref=x;amptype=chimera").unwrap();
        assert_eq!(h.amptype, "chimera");
        assert!(!h.is_amplicon());

        assert_eq!(AmpliconHeader::parse("Zotu1;size=2;amptype=otu"), None);
        assert_eq!(AmpliconHeader::parse("SEQ1;size=2;"), None);
    }

    #[test]
    fn keep_all_keeps_everything() {
        let candidates = vec![
            Candidate {
                sequence: b"ACGT".to_vec(),
                count: 3,
            };
            4
        ];
        assert_eq!(KeepAll.denoise(&candidates).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn reads_back_tool_output() {
        let cmd = UnoiseCommand::new("unoise", Vec::new(), 8).unwrap();
        std::fs::write(
            cmd.output_path(),
            ">SEQ2;size=9;amptype=otu;\nACGT\n>SEQ1;size=20;amptype=chimera;\nGGGG\n>SEQ3;size=8;amptype=otu;\nTTTT\n",
        )
        .unwrap();
        assert_eq!(cmd.read_amplicons(3).unwrap(), vec![1, 2]);

        let err = cmd.read_amplicons(2).unwrap_err();
        assert!(matches!(err, Error::UnknownSyntheticId(h) if h.starts_with("SEQ3")));
    }

    #[cfg(unix)]
    fn script(dir: &std::path::Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("unoise.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_str().unwrap().to_owned()
    }

    fn candidates() -> Vec<Candidate> {
        vec![
            Candidate {
                sequence: b"ACGTACGT".to_vec(),
                count: 12,
            },
            Candidate {
                sequence: b"ACGTACGA".to_vec(),
                count: 2,
            },
        ]
    }

    #[cfg(unix)]
    #[test]
    fn runs_the_tool_and_keeps_amplicons() {
        let dir = tempfile::tempdir().unwrap();
        // $2 is the candidate FASTA and $4 the amplicon output
        let program = script(
            dir.path(),
            r#"[ "$(grep -c '^>SEQ' "$2")" = 2 ] || exit 3
[ "$6" = 8 ] || exit 4
printf '>SEQ2;size=2;amptype=chimera;\nACGTACGA\n>SEQ1;size=12;amptype=otu;\nACGTACGT\n' > "$4""#,
        );

        let cmd = UnoiseCommand::new(program, Vec::new(), 8).unwrap();
        assert_eq!(cmd.denoise(&candidates()).unwrap(), vec![0]);
        assert!(!cmd.input_path().exists());
        assert!(!cmd.output_path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "exit 1");

        let cmd = UnoiseCommand::new(program, Vec::new(), 8).unwrap();
        assert!(matches!(
            cmd.denoise(&candidates()),
            Err(Error::ToolFailed { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn unknown_tool_identity_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(
            dir.path(),
            r#"printf '>SEQ7;size=2;amptype=otu;\nACGT\n' > "$4""#,
        );

        let cmd = UnoiseCommand::new(program, Vec::new(), 8).unwrap();
        assert!(matches!(
            cmd.denoise(&candidates()),
            Err(Error::UnknownSyntheticId(h)) if h.starts_with("SEQ7")
        ));
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let cmd = UnoiseCommand::new("ampliplex-no-such-denoiser", Vec::new(), 8).unwrap();
        let candidates = [Candidate {
            sequence: b"ACGT".to_vec(),
            count: 10,
        }];
        assert!(matches!(
            cmd.denoise(&candidates),
            Err(Error::ToolSpawn { .. })
        ));
        assert!(cmd.input_path().exists());
    }
}
