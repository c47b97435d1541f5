use std::fs;
use std::path::PathBuf;
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::LyraError;
use crate::fs_util;

static COVER_IMAGE: &[u8] = include_bytes!("../assets/cover.jpg");
static LOGO_IMAGE: &[u8] = include_bytes!("../assets/lyra-logo.jpg");
static REPORT_CLASS: &str = include_str!("../assets/lyrareport.cls");

/// Backend that receives ordered content-insertion calls and renders the
/// final typeset source. The report owns one by composition and forwards to
/// it, so the append-ordering logic stays independent of the backend.
pub trait DocumentBuilder {
    fn append_raw(&mut self, markup: &str);
    fn append_command(&mut self, name: &str, argument: &str);
    fn render(&self) -> String;
}

#[derive(Debug, Default)]
pub struct LatexBuilder {
    body: Vec<String>,
}

impl DocumentBuilder for LatexBuilder {
    fn append_raw(&mut self, markup: &str) {
        self.body.push(markup.to_string());
    }

    fn append_command(&mut self, name: &str, argument: &str) {
        self.body.push(format!("\\{name}{{{argument}}}"));
    }

    fn render(&self) -> String {
        let mut source = String::new();
        source.push_str("\\documentclass{lyrareport}\n");
        source.push_str("\\begin{document}\n");
        for line in &self.body {
            source.push_str(line);
            source.push('\n');
        }
        source.push_str("\\end{document}\n");
        source
    }
}

/// Front-matter fields of a report.
#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub title: String,
    pub subtitle: String,
    pub subject: String,
    pub author: String,
    pub affiliation: String,
    pub contact: String,
    pub institute: String,
    pub department: String,
    pub email: String,
}

impl Default for ReportMeta {
    fn default() -> Self {
        Self {
            title: "Lyra report".to_string(),
            subtitle: "Subtitle".to_string(),
            subject: "Subject".to_string(),
            author: "lyralab.org".to_string(),
            affiliation: "https://lyralab.org".to_string(),
            contact: "Research Data Office".to_string(),
            institute: "University of Leeds".to_string(),
            department: "Imaging Sciences".to_string(),
            email: "data@lyralab.org".to_string(),
        }
    }
}

/// Styled PDF report assembled from ordered fragments and compiled by an
/// external LaTeX compiler.
pub struct Report<B: DocumentBuilder> {
    builder: B,
    folder: Utf8PathBuf,
    filename: String,
    compiler: Option<PathBuf>,
}

impl Report<LatexBuilder> {
    pub fn new(folder: &Utf8Path, filename: &str, meta: ReportMeta) -> Self {
        Self::with_builder(LatexBuilder::default(), folder, filename, meta)
    }
}

impl<B: DocumentBuilder> Report<B> {
    pub fn with_builder(builder: B, folder: &Utf8Path, filename: &str, meta: ReportMeta) -> Self {
        let mut report = Self {
            builder,
            folder: folder.to_owned(),
            filename: filename.to_string(),
            compiler: find_in_path("pdflatex"),
        };
        report.front_matter(&meta);
        report
    }

    /// Cover, title page, table of contents, main-matter switch.
    fn front_matter(&mut self, meta: &ReportMeta) {
        self.builder.append_raw("\\frontmatter");
        self.builder.append_command("title", &meta.title);
        self.builder.append_command("subtitle", &meta.subtitle);
        self.builder.append_command("author", &meta.author);
        self.builder.append_command("subject", &meta.subject);
        self.builder.append_command("affiliation", &meta.affiliation);
        self.builder.append_command("coverimage", "cover.jpg");
        self.builder
            .append_raw("\\definecolor{title}{HTML}{FF0000}");
        self.builder.append_raw("\\makecover");

        self.builder.append_raw("\\begin{titlepage}");
        self.builder.append_raw("\\begin{center}");
        self.builder.append_raw("\\makeatletter");
        self.builder
            .append_raw("\\largetitlestyle\\fontsize{45}{45}\\selectfont\\@title");
        self.builder.append_raw("\\linebreak");
        self.builder.append_raw(
            "\\ifdefvoid{\\@subtitle}{}{\\bigskip\\titlestyle\\fontsize{20}{20}\\selectfont\\@subtitle}",
        );
        self.builder.append_raw("\\linebreak");
        self.builder.append_raw("\\bigskip\\bigskip");
        self.builder.append_raw("by");
        self.builder.append_raw("\\linebreak");
        self.builder.append_raw("\\bigskip\\bigskip");
        self.builder
            .append_raw("\\largetitlestyle\\fontsize{25}{25}\\selectfont\\@author");
        self.builder.append_raw("\\makeatother");
        self.builder.append_raw("\\vfill");
        self.builder.append_raw("\\large");
        self.builder.append_raw("\\begin{tabular}{ll}");
        self.builder.append_raw("\\hline");
        self.builder
            .append_raw(&format!("Report compiled by: & {} \\\\", meta.contact));
        self.builder
            .append_raw(&format!("Institute: & {} \\\\", meta.institute));
        self.builder
            .append_raw(&format!("Department: & {} \\\\", meta.department));
        self.builder
            .append_raw(&format!("Email: & {} \\\\", meta.email));
        self.builder.append_raw("Date: & \\today \\\\");
        self.builder.append_raw("\\hline");
        self.builder.append_raw("\\end{tabular}");
        self.builder.append_raw("\\begin{figure}[b!]");
        self.builder.append_raw("\\centering");
        self.builder
            .append_raw("\\includegraphics[width=2in]{lyra-logo.jpg}");
        self.builder.append_raw("\\end{figure}");
        self.builder.append_raw("\\end{center}");
        self.builder.append_raw("\\end{titlepage}");

        self.builder.append_raw("\\newpage");
        self.builder.append_raw("\\tableofcontents");
        self.builder.append_raw("\\mainmatter");
    }

    /// Raw markup passthrough for callers that need backend features the
    /// typed operations do not cover.
    pub fn append_raw(&mut self, markup: &str) {
        self.builder.append_raw(markup);
    }

    /// Continue on a new page.
    pub fn clearpage(&mut self) {
        self.builder.append_raw("\\clearpage");
    }

    pub fn chapter(&mut self, title: &str) {
        self.builder.append_raw("\\clearpage");
        self.builder.append_command("chapter", title);
    }

    pub fn section(&mut self, title: &str, clearpage: bool) {
        if clearpage {
            self.builder.append_raw("\\clearpage");
        }
        self.builder.append_command("section", title);
    }

    pub fn subsection(&mut self, title: &str, clearpage: bool) {
        if clearpage {
            self.builder.append_raw("\\clearpage");
        }
        self.builder.append_command("subsection", title);
    }

    /// Insert an image figure. Width defaults to 6in.
    pub fn figure(
        &mut self,
        file: &Utf8Path,
        width: Option<&str>,
        caption: Option<&str>,
        clearpage: bool,
    ) -> Result<(), LyraError> {
        if !file.as_std_path().exists() {
            return Err(LyraError::FigureNotFound(file.to_owned()));
        }
        if clearpage {
            self.builder.append_raw("\\clearpage");
        }
        self.builder.append_raw("\\begin{figure}[h!]");
        self.builder.append_raw("\\centering");
        self.builder.append_raw(&format!(
            "\\includegraphics[width={}]{{{file}}}",
            width.unwrap_or("6in")
        ));
        if let Some(caption) = caption {
            self.builder
                .append_command("caption", &escape_latex(caption));
        }
        self.builder.append_raw("\\end{figure}");
        Ok(())
    }

    /// Insert a long table from a CSV file; the first row is the header.
    /// Column widths are automatic unless `column_width` (cm) is given.
    pub fn table(
        &mut self,
        file: &Utf8Path,
        column_width: Option<f32>,
        caption: Option<&str>,
        clearpage: bool,
    ) -> Result<(), LyraError> {
        if !file.as_std_path().exists() {
            return Err(LyraError::TableNotFound(file.to_owned()));
        }
        let mut reader = csv::Reader::from_path(file.as_std_path())
            .map_err(|err| LyraError::Filesystem(err.to_string()))?;
        let header: Vec<String> = reader
            .headers()
            .map_err(|err| LyraError::Filesystem(err.to_string()))?
            .iter()
            .map(|cell| cell.to_string())
            .collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| LyraError::Filesystem(err.to_string()))?;
            rows.push(
                record
                    .iter()
                    .map(|cell| cell.to_string())
                    .collect::<Vec<_>>(),
            );
        }

        let extra_cols = header.len().saturating_sub(1);
        let column_format = match column_width {
            None => format!("r{}", "c".repeat(extra_cols)),
            Some(width) => format!(
                "|p{{{width}cm}}|{}",
                format!("p{{{width}cm}}|").repeat(extra_cols)
            ),
        };

        if clearpage {
            self.builder.append_raw("\\clearpage");
        }
        self.builder
            .append_raw(&format!("\\begin{{longtable}}{{{column_format}}}"));
        self.builder.append_raw("\\hline");
        self.builder.append_raw(&format!("{} \\\\", latex_row(&header)));
        self.builder.append_raw("\\hline");
        for row in &rows {
            self.builder.append_raw(&format!("{} \\\\", latex_row(row)));
        }
        self.builder.append_raw("\\hline");
        if let Some(caption) = caption {
            self.builder
                .append_raw(&format!("\\caption{{{}}} \\\\", escape_latex(caption)));
        }
        self.builder.append_raw("\\end{longtable}");
        Ok(())
    }

    /// The full typeset source as it will be written to disk.
    pub fn render_source(&self) -> String {
        self.builder.render()
    }

    /// Stage assets and source into `{folder}/{filename}_source/`, compile
    /// twice so cross-references resolve, and move the PDF up into `folder`.
    pub fn build(&self) -> Result<Utf8PathBuf, LyraError> {
        let compiler = self
            .compiler
            .as_ref()
            .ok_or_else(|| LyraError::MissingTool("pdflatex".to_string()))?;

        let source_dir = self.folder.join(format!("{}_source", self.filename));
        fs::create_dir_all(source_dir.as_std_path())
            .map_err(|err| LyraError::Filesystem(err.to_string()))?;
        fs::write(source_dir.join("cover.jpg").as_std_path(), COVER_IMAGE)
            .map_err(|err| LyraError::Filesystem(err.to_string()))?;
        fs::write(source_dir.join("lyra-logo.jpg").as_std_path(), LOGO_IMAGE)
            .map_err(|err| LyraError::Filesystem(err.to_string()))?;
        fs::write(
            source_dir.join("lyrareport.cls").as_std_path(),
            REPORT_CLASS,
        )
        .map_err(|err| LyraError::Filesystem(err.to_string()))?;
        let tex_name = format!("{}.tex", self.filename);
        fs::write(
            source_dir.join(&tex_name).as_std_path(),
            self.builder.render(),
        )
        .map_err(|err| LyraError::Filesystem(err.to_string()))?;

        // Two passes so the table of contents and cross-references resolve.
        for _ in 0..2 {
            let output = Command::new(compiler)
                .arg("-interaction=nonstopmode")
                .arg(&tex_name)
                .current_dir(source_dir.as_std_path())
                .output()
                .map_err(|err| LyraError::ReportBuild(err.to_string()))?;
            if !output.status.success() {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let tail: String = stdout
                    .lines()
                    .rev()
                    .take(20)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect::<Vec<_>>()
                    .join("\n");
                return Err(LyraError::ReportBuild(tail));
            }
        }

        let pdf_name = format!("{}.pdf", self.filename);
        let built = source_dir.join(&pdf_name);
        let target = self.folder.join(&pdf_name);
        fs_util::force_move(built.as_std_path(), target.as_std_path())?;
        Ok(target)
    }
}

fn latex_row(cells: &[String]) -> String {
    cells
        .iter()
        .map(|cell| escape_latex(cell))
        .collect::<Vec<_>>()
        .join(" & ")
}

fn escape_latex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '_' | '#' | '$' | '%' | '&' | '{' | '}' | '^' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            other => escaped.push(other),
        }
    }
    escaped
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}
