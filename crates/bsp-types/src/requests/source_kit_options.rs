use serde::{Deserialize, Serialize};

use crate::requests::Request;
use crate::{BuildTargetIdentifier, LanguageId, TextDocumentIdentifier};

/// The options request is sent from the client to the server to query for the list of compiler
/// options necessary to compile a given file in a given target.
#[derive(Debug)]
pub enum TextDocumentSourceKitOptions {}

impl Request for TextDocumentSourceKitOptions {
    type Params = TextDocumentSourceKitOptionsParams;
    type Result = Option<TextDocumentSourceKitOptionsResult>;
    const METHOD: &'static str = "textDocument/sourceKitOptions";
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentSourceKitOptionsParams {
    /// The text document to get options for.
    pub text_document: TextDocumentIdentifier,

    /// The target for which the build settings should be returned. A source file might be part
    /// of multiple targets and might have different compiler arguments in each of them.
    pub target: BuildTargetIdentifier,

    /// The language with which the document was opened in the editor.
    pub language: LanguageId,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentSourceKitOptionsResult {
    /// The compiler options required for the requested file.
    pub compiler_arguments: Vec<String>,

    /// The working directory for the compile command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,

    /// Additional data about the build settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}
