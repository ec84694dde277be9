use crate::infer::InferenceError;
use ariadne::{ColorGenerator, Label, Report, ReportKind};
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct FileSpan {
    pub span: Range<usize>,
    pub path: String,
}

impl FileSpan {
    pub fn new(path: String, span: Range<usize>) -> Self {
        Self { path, span }
    }
}

impl ariadne::Span for FileSpan {
    type SourceId = String;

    fn source(&self) -> &Self::SourceId {
        &self.path
    }

    fn start(&self) -> usize {
        self.span.start
    }

    fn end(&self) -> usize {
        self.span.end
    }
}

/// Creates a report from an inference error found in the file at `path`.
pub fn inference_error_to_report(error: &InferenceError, path: &str) -> Report<'static, FileSpan> {
    let mut colors = ColorGenerator::new();
    colors.next();
    let filespan = FileSpan::new(path.to_string(), error.loc().into());
    let report = Report::build(ReportKind::Error, filespan.clone()).with_code(error.code());

    match error {
        InferenceError::UnknownMethod {
            method, receiver, ..
        } => report
            .with_label(
                Label::new(filespan)
                    .with_message(format!("method {method:?} does not exist on {receiver}"))
                    .with_color(colors.next()),
            )
            .with_message("Unknown method.")
            .finish(),
        InferenceError::ArgumentCountMismatch {
            method,
            expected,
            found,
            ..
        } => report
            .with_label(
                Label::new(filespan)
                    .with_message(format!("expected {expected} arguments, got {found}"))
                    .with_color(colors.next()),
            )
            .with_message(format!("Wrong number of arguments for {method}."))
            .finish(),
        InferenceError::ArgumentTypeMismatch {
            method,
            arg,
            expected,
            found,
            ..
        } => report
            .with_label(
                Label::new(filespan)
                    .with_message(format!("expected {expected}, got {found}"))
                    .with_color(colors.next()),
            )
            .with_message(format!("Argument {arg:?} of {method} has the wrong type."))
            .finish(),
        InferenceError::PrivateMethodCall { method, .. } => report
            .with_label(
                Label::new(filespan)
                    .with_message(format!("{method} is private"))
                    .with_color(colors.next()),
            )
            .with_note("private methods can only be called without an explicit receiver")
            .finish(),
        InferenceError::ReturnTypeMismatch {
            expected, found, ..
        } => report
            .with_label(
                Label::new(filespan)
                    .with_message(format!("returns {found}"))
                    .with_color(colors.next()),
            )
            .with_message(format!("Expected {expected} for method result type."))
            .finish(),
        InferenceError::BlockReturnTypeMismatch {
            method,
            expected,
            found,
            ..
        } => report
            .with_label(
                Label::new(filespan)
                    .with_message(format!("block returns {found}"))
                    .with_color(colors.next()),
            )
            .with_message(format!("Block passed to {method} must return {expected}."))
            .finish(),
        InferenceError::CastTypeMismatch {
            cast,
            expected,
            found,
            ..
        } => report
            .with_label(
                Label::new(filespan)
                    .with_message(format!("this is {found}"))
                    .with_color(colors.next()),
            )
            .with_message(format!("Argument to T.{cast} is not {expected}."))
            .finish(),
        InferenceError::NotExhaustive { found, .. } => report
            .with_label(
                Label::new(filespan)
                    .with_message(format!("{found} is still possible here"))
                    .with_color(colors.next()),
            )
            .with_message("Control flow could reach T.absurd.")
            .finish(),
    }
}

#[cfg(test)]
mod tests {
    use super::inference_error_to_report;
    use crate::global::LocOffsets;
    use crate::infer::InferenceError;

    #[test]
    fn report_carries_the_error_code() {
        let error = InferenceError::NotExhaustive {
            loc: LocOffsets::new(4, 9),
            found: "Integer".to_string(),
        };
        let report = inference_error_to_report(&error, "main.rb");
        let mut out = Vec::new();
        report
            .write(ariadne::sources([("main.rb".to_string(), "x = T.absurd(y)\n")]), &mut out)
            .unwrap();
        let out = String::from_utf8_lossy(&out);
        assert!(out.contains("NotExhaustive"), "{out}");
        assert!(out.contains("Integer is still possible here"), "{out}");
    }
}
