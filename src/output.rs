use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_files(paths: &[Utf8PathBuf]) -> io::Result<()> {
        #[derive(Serialize)]
        struct Payload<'a> {
            files: Vec<&'a str>,
        }
        Self::print_json(&Payload {
            files: paths.iter().map(|path| path.as_str()).collect(),
        })
    }

    pub fn print_folder(folder: &Utf8Path) -> io::Result<()> {
        #[derive(Serialize)]
        struct Payload<'a> {
            folder: &'a str,
        }
        Self::print_json(&Payload {
            folder: folder.as_str(),
        })
    }

    pub fn print_uploaded(remote_path: &str) -> io::Result<()> {
        #[derive(Serialize)]
        struct Payload<'a> {
            uploaded: &'a str,
        }
        Self::print_json(&Payload {
            uploaded: remote_path,
        })
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
