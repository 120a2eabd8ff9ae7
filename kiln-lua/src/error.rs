//! Error types for script conversion

use thiserror::Error;

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Errors that can occur while converting a script into a configuration
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The script does not define a global `main`
    #[error("script: missing main function")]
    MainMissing,

    /// The script defines a global `main` that cannot be called
    #[error("script: main must be a function")]
    MainInvalid,

    /// `main` returned something other than a table
    #[error("script: main returns an invalid type")]
    MainReturn,

    /// The script tried to load external code
    #[error("script: cannot load external scripts")]
    CannotLoad,

    /// The rendered configuration outgrew the size ceiling
    #[error("script: maximum file size exceeded")]
    MaximumSize,

    /// A host value could not be translated into a script value
    #[error("script: invalid argument at {path}: {reason}")]
    Argument { path: String, reason: String },

    /// The returned value contains something that cannot be rendered
    #[error("script: cannot render value at {path}: {reason}")]
    Unsupported { path: String, reason: String },

    /// The YAML emitter rejected a document
    #[error("script: cannot emit configuration: {0}")]
    Emit(#[from] serde_yaml::Error),

    /// Error raised by the interpreter (syntax, runtime, step limit)
    #[error(transparent)]
    Script(mlua::Error),
}

impl ConvertError {
    pub(crate) fn argument(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Argument {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Marker raised by the sandbox loader when a script asks for external code.
///
/// It travels through the interpreter as an external error and is turned
/// back into [`ConvertError::CannotLoad`] when the call returns.
#[derive(Debug, Error)]
#[error("cannot load external scripts")]
pub struct LoadRefused;

impl From<mlua::Error> for ConvertError {
    fn from(err: mlua::Error) -> Self {
        if refused_load(&err) {
            ConvertError::CannotLoad
        } else {
            ConvertError::Script(err)
        }
    }
}

/// Walks callback and context wrappers looking for a refused load
fn refused_load(err: &mlua::Error) -> bool {
    match err {
        mlua::Error::CallbackError { cause, .. } => refused_load(cause),
        mlua::Error::WithContext { cause, .. } => refused_load(cause),
        mlua::Error::ExternalError(inner) => inner.downcast_ref::<LoadRefused>().is_some(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_load_is_classified() {
        let err = mlua::Error::external(LoadRefused);
        assert!(matches!(ConvertError::from(err), ConvertError::CannotLoad));
    }

    #[test]
    fn test_wrapped_refused_load_is_classified() {
        let err = mlua::Error::CallbackError {
            traceback: "stack traceback:".to_string(),
            cause: std::sync::Arc::new(mlua::Error::external(LoadRefused)),
        };
        assert!(matches!(ConvertError::from(err), ConvertError::CannotLoad));
    }

    #[test]
    fn test_other_errors_are_forwarded() {
        let err = mlua::Error::runtime("boom");
        match ConvertError::from(err) {
            ConvertError::Script(inner) => assert!(inner.to_string().contains("boom")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
