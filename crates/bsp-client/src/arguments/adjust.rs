//! Adjusts build-server compiler arguments for semantic editor functionality.
//!
//! Build invocations carry flags that make no sense for parsing and indexing (output emission,
//! dependency tracking, whole-module builds). Those are stripped and a small set of
//! index-friendly flags is appended. Flag matching models the dash count, the attachment style
//! of the value (separate token, `=`, or no space) and sidecar markers like `-Xfrontend` that
//! must be removed together with the flag they prefix.

use bsp_types::LanguageId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DashPrefix {
    Single,
    Either,
}

#[derive(Clone, Copy, Debug, Default)]
struct Attachment {
    separate: bool,
    equals: bool,
    attached: bool,
}

const NO_ARG: Attachment = Attachment {
    separate: false,
    equals: false,
    attached: false,
};
const SEPARATE: Attachment = Attachment {
    separate: true,
    equals: false,
    attached: false,
};
const SEPARATE_OR_EQUALS: Attachment = Attachment {
    separate: true,
    equals: true,
    attached: false,
};
const SEPARATE_OR_ATTACHED: Attachment = Attachment {
    separate: true,
    equals: false,
    attached: true,
};
const EQUALS: Attachment = Attachment {
    separate: false,
    equals: true,
    attached: false,
};

struct FlagSpec {
    name: &'static str,
    dash: DashPrefix,
    arg: Attachment,
}

const fn flag(name: &'static str) -> FlagSpec {
    FlagSpec {
        name,
        dash: DashPrefix::Single,
        arg: NO_ARG,
    }
}

const fn flag_with(name: &'static str, arg: Attachment) -> FlagSpec {
    FlagSpec {
        name,
        dash: DashPrefix::Single,
        arg,
    }
}

const fn flag_either_dash(name: &'static str) -> FlagSpec {
    FlagSpec {
        name,
        dash: DashPrefix::Either,
        arg: NO_ARG,
    }
}

/// How many tokens a matched flag occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Consume {
    Flag,
    FlagAndValue,
}

impl FlagSpec {
    fn matches(&self, token: &str) -> Option<Consume> {
        let rest = match self.dash {
            DashPrefix::Single => token.strip_prefix('-')?,
            DashPrefix::Either => token
                .strip_prefix("--")
                .or_else(|| token.strip_prefix('-'))?,
        };
        if rest == self.name {
            return if self.arg.separate {
                Some(Consume::FlagAndValue)
            } else {
                Some(Consume::Flag)
            };
        }
        if let Some(value) = rest.strip_prefix(self.name) {
            if self.arg.equals && value.starts_with('=') {
                return Some(Consume::Flag);
            }
            if self.arg.attached && !value.is_empty() {
                return Some(Consume::Flag);
            }
        }
        None
    }
}

const SWIFT_FLAGS_TO_REMOVE: &[FlagSpec] = &[
    flag("c"),
    flag("disable-cmo"),
    flag("emit-dependencies"),
    flag("emit-module"),
    flag_with("emit-module-path", SEPARATE_OR_EQUALS),
    flag_with("emit-module-interface-path", SEPARATE),
    flag_with("emit-module-source-info-path", SEPARATE),
    flag("emit-objc-header"),
    flag_with("emit-objc-header-path", SEPARATE),
    flag("incremental"),
    flag("no-color-diagnostics"),
    flag("parseable-output"),
    flag("save-temps"),
    flag("serialize-diagnostics"),
    flag("whole-module-optimization"),
    flag_with("num-threads", SEPARATE),
    flag_with("output-file-map", SEPARATE_OR_EQUALS),
];

const CLANG_FLAGS_TO_REMOVE: &[FlagSpec] = &[
    flag("M"),
    flag("MD"),
    flag("MMD"),
    flag("MG"),
    flag("MM"),
    flag("MV"),
    flag("MP"),
    flag_with("MJ", SEPARATE_OR_ATTACHED),
    flag_with("MT", SEPARATE_OR_ATTACHED),
    flag_with("MF", SEPARATE_OR_ATTACHED),
    flag_with("MQ", SEPARATE_OR_ATTACHED),
    flag("c"),
    flag("fmodules-validate-once-per-build-session"),
    flag_either_dash("serialize-diagnostics"),
    flag_with("fbuild-session-file", EQUALS),
];

/// Flags that make clang retain the information the indexer needs.
const CLANG_INDEXING_EXTRAS: &[&str] = &[
    "-fretain-comments-from-system-headers",
    "-Xclang",
    "-detailed-preprocessing-record",
    "-Xclang",
    "-fmodule-format=raw",
    "-Xclang",
    "-fallow-pch-with-compiler-errors",
    "-Xclang",
    "-fallow-pcm-with-compiler-errors",
    "-Wno-non-modular-include-in-framework-module",
    "-Wno-incomplete-umbrella",
];

/// Frontend flags that suppress function bodies; removed together with their `-Xfrontend`
/// sidecar.
fn is_skip_function_bodies_flag(token: &str) -> bool {
    token
        .strip_prefix('-')
        .map(|rest| {
            rest.starts_with("experimental-skip-") && rest.ends_with("-function-bodies")
        })
        .unwrap_or(false)
}

/// Dispatch to the profile matching the language; arguments of other languages are returned
/// unchanged.
pub fn adjust_compiler_arguments(arguments: &[String], language: &LanguageId) -> Vec<String> {
    if *language == LanguageId::SWIFT {
        adjust_swift_arguments(arguments)
    } else if language.is_c_family() {
        adjust_clang_arguments(arguments)
    } else {
        arguments.to_vec()
    }
}

pub fn adjust_swift_arguments(arguments: &[String]) -> Vec<String> {
    let had_index_unit_output_path = arguments.iter().any(|a| a == "-index-unit-output-path");
    let mut result: Vec<String> = Vec::with_capacity(arguments.len());
    let mut output_path: Option<String> = None;

    let mut i = 0;
    while i < arguments.len() {
        let token = &arguments[i];
        if token == "-o" {
            pop_sidecar(&mut result);
            if i + 1 < arguments.len() {
                output_path = Some(arguments[i + 1].clone());
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }
        if is_skip_function_bodies_flag(token) {
            pop_sidecar(&mut result);
            i += 1;
            continue;
        }
        match match_any(SWIFT_FLAGS_TO_REMOVE, token) {
            Some(consume) => {
                pop_sidecar(&mut result);
                i += consumed_tokens(consume, i, arguments.len());
            }
            None => {
                result.push(token.clone());
                i += 1;
            }
        }
    }

    if let Some(output_path) = output_path {
        if !had_index_unit_output_path {
            result.push("-index-unit-output-path".to_string());
            result.push(output_path);
        }
    }
    result.push("-Xfrontend".to_string());
    result.push("-empty-abi-descriptor".to_string());
    for extra in CLANG_INDEXING_EXTRAS {
        result.push("-Xcc".to_string());
        result.push((*extra).to_string());
    }
    result
}

pub fn adjust_clang_arguments(arguments: &[String]) -> Vec<String> {
    let mut result: Vec<String> = Vec::with_capacity(arguments.len());

    let mut i = 0;
    while i < arguments.len() {
        let token = &arguments[i];
        match match_any(CLANG_FLAGS_TO_REMOVE, token) {
            Some(consume) => {
                pop_sidecar(&mut result);
                i += consumed_tokens(consume, i, arguments.len());
            }
            None => {
                result.push(token.clone());
                i += 1;
            }
        }
    }

    result.extend(CLANG_INDEXING_EXTRAS.iter().map(|s| s.to_string()));
    result.push("-fsyntax-only".to_string());
    result
}

fn match_any(specs: &[FlagSpec], token: &str) -> Option<Consume> {
    specs.iter().find_map(|spec| spec.matches(token))
}

fn consumed_tokens(consume: Consume, index: usize, len: usize) -> usize {
    match consume {
        Consume::Flag => 1,
        // A separate value can only be consumed when it exists.
        Consume::FlagAndValue => {
            if index + 1 < len {
                2
            } else {
                1
            }
        }
    }
}

fn pop_sidecar(result: &mut Vec<String>) {
    if result.last().map(String::as_str) == Some("-Xfrontend") {
        result.pop();
    }
}
