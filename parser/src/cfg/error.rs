use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

pub type MResult<T> = miette::Result<T>;
pub type Result<T> = std::result::Result<T, CfgError>;

#[derive(Error, Debug, Diagnostic, Clone)]
#[error("Error in configuration file")]
#[diagnostic()]
pub struct CfgError {
    #[label("Error here")]
    pub err_span: Option<SourceSpan>,
    #[help]
    pub help_msg: String,
    pub file_name: Option<String>,
    pub file_content: Option<String>,
}

pub(super) fn help(err_msg: impl AsRef<str>) -> String {
    format!(
        r"{}

For more info, see the sample configuration in cfg_samples/handheld-input.toml.",
        err_msg.as_ref(),
    )
}

/// Error without a location in the source, e.g. a cross-field validation failure.
pub(super) fn error_msg(err_msg: impl AsRef<str>) -> CfgError {
    CfgError {
        err_span: None,
        help_msg: help(err_msg),
        file_name: None,
        file_content: None,
    }
}

pub(super) fn error_toml(e: &toml::de::Error) -> CfgError {
    CfgError {
        err_span: e
            .span()
            .map(|span| span_start_len(span.start, span.end - span.start)),
        help_msg: help(e.message()),
        file_name: None,
        file_content: None,
    }
}

pub(super) fn span_start_len(start: usize, len: usize) -> SourceSpan {
    SourceSpan::new(start.into(), len.into())
}

impl CfgError {
    pub(super) fn in_file(mut self, file_name: &str, file_content: &str) -> Self {
        self.file_name = Some(file_name.to_owned());
        self.file_content = Some(file_content.to_owned());
        self
    }
}

pub fn error_with_source(e: CfgError) -> miette::Error {
    let filename = e.file_name.clone();
    let source = e.file_content.clone();
    let e2: miette::Error = e.into();
    if let (Some(f), Some(s)) = (filename, source) {
        e2.with_source_code(NamedSource::new(f, s))
    } else {
        e2
    }
}
