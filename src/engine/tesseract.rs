use super::{process, EngineError, Raster, Recognizer, RecognizerDiag};
use tracing::debug;

/// Runs the `tesseract` CLI once per page, PNG in on stdin, PDF out on stdout.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    exe: String,
    tessdata_dir: Option<String>,
}

impl TesseractRecognizer {
    pub fn new(exe: impl Into<String>, tessdata_dir: Option<String>) -> Self {
        Self {
            exe: exe.into(),
            tessdata_dir: tessdata_dir.filter(|d| !d.trim().is_empty()),
        }
    }

    fn base_args(&self) -> Vec<String> {
        match &self.tessdata_dir {
            Some(dir) => vec!["--tessdata-dir".into(), dir.clone()],
            None => Vec::new(),
        }
    }

    fn version(&self) -> Result<String, EngineError> {
        let out = process::run_piped(&self.exe, ["--version"], None)
            .map_err(|e| EngineError::Unavailable(format!("{}: {e}", self.exe)))?;
        if !out.status.success() {
            return Err(EngineError::Unavailable(format!(
                "{} --version exited with {}",
                self.exe, out.status
            )));
        }
        // Older releases print the banner on stderr.
        let text = if out.stdout.is_empty() {
            String::from_utf8_lossy(&out.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&out.stdout).into_owned()
        };
        Ok(text.lines().next().unwrap_or("").trim().to_string())
    }

    fn languages(&self) -> Result<Vec<String>, EngineError> {
        let mut args = self.base_args();
        args.push("--list-langs".into());
        let out = process::run_piped(&self.exe, &args, None)
            .map_err(|e| EngineError::Unavailable(format!("{}: {e}", self.exe)))?;
        if !out.status.success() {
            return Err(EngineError::Unavailable(format!(
                "{} --list-langs exited with {}: {}",
                self.exe,
                out.status,
                process::stderr_tail(&out)
            )));
        }
        Ok(parse_language_list(&String::from_utf8_lossy(&out.stdout)))
    }
}

/// Parses `tesseract --list-langs` output; the first line is a banner.
pub fn parse_language_list(raw: &str) -> Vec<String> {
    raw.lines()
        .skip_while(|l| l.starts_with("List of available languages"))
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Languages from a `+`-joined code (e.g. `eng+deu`) that are not installed.
pub fn missing_languages(requested: &str, installed: &[String]) -> Vec<String> {
    requested
        .split('+')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| !installed.iter().any(|i| i == l))
        .map(String::from)
        .collect()
}

impl Recognizer for TesseractRecognizer {
    fn probe(&self, language: &str) -> Result<RecognizerDiag, EngineError> {
        let version = self.version()?;
        let languages = self.languages()?;
        let missing = missing_languages(language, &languages);
        if !missing.is_empty() {
            return Err(EngineError::Unavailable(format!(
                "language data not installed: {}",
                missing.join(", ")
            )));
        }
        Ok(RecognizerDiag {
            exe: self.exe.clone(),
            version,
            languages,
            ok: true,
            error: None,
        })
    }

    fn recognize(&self, raster: &Raster, language: &str) -> Result<Vec<u8>, EngineError> {
        let mut args = self.base_args();
        args.extend([
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            language.to_string(),
            "--dpi".to_string(),
            raster.dpi.to_string(),
            "pdf".to_string(),
        ]);

        let out = process::run_piped(&self.exe, &args, Some(&raster.png))
            .map_err(|e| EngineError::RecognitionFailed(format!("{}: {e}", self.exe)))?;
        if !out.status.success() {
            return Err(EngineError::RecognitionFailed(format!(
                "{} exited with {}: {}",
                self.exe,
                out.status,
                process::stderr_tail(&out)
            )));
        }
        if !out.stdout.starts_with(b"%PDF") {
            return Err(EngineError::RecognitionFailed(
                "tesseract produced no PDF output".into(),
            ));
        }
        debug!(bytes = out.stdout.len(), "recognized page");
        Ok(out.stdout)
    }
}
