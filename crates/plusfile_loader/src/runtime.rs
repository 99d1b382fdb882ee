//! JsRuntime execution of generated modules.
//!
//! Every load gets a fresh `JsRuntime`, so nothing a module does at its top
//! level survives into the next load.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use deno_core::{
    extension, op2, FsModuleLoader, JsRuntime, ModuleLoadOptions, ModuleLoadReferrer,
    ModuleLoadResponse, ModuleLoader, ModuleSpecifier, ResolutionKind, RuntimeOptions,
};
use deno_error::JsErrorBox;

use crate::deps::{NodeResolver, Resolver};
use crate::error::LoadFailure;
use crate::Exports;

thread_local! {
    /// Exports handed over by the entry module, as JSON.
    static CAPTURED_EXPORTS: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Custom op to receive the captured exports from JavaScript.
#[op2(fast)]
fn op_set_exports(#[string] exports_json: String) {
    CAPTURED_EXPORTS.with(|cell| {
        *cell.borrow_mut() = Some(exports_json);
    });
}

extension!(plusfile_ext, ops = [op_set_exports]);

/// Module loader resolving bare package specifiers through `node_modules`.
///
/// Relative and URL specifiers, and all loading, go through [`FsModuleLoader`].
struct PackageModuleLoader<R> {
    resolver: R,
}

fn is_bare_specifier(specifier: &str) -> bool {
    !(specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
        || ModuleSpecifier::parse(specifier).is_ok())
}

impl<R: Resolver> ModuleLoader for PackageModuleLoader<R> {
    fn resolve(
        &self,
        specifier: &str,
        referrer: &str,
        kind: ResolutionKind,
    ) -> Result<ModuleSpecifier, JsErrorBox> {
        if !is_bare_specifier(specifier) {
            return FsModuleLoader.resolve(specifier, referrer, kind);
        }

        let search_root = ModuleSpecifier::parse(referrer)
            .ok()
            .and_then(|url| url.to_file_path().ok())
            .and_then(|path| path.parent().map(Path::to_path_buf))
            .ok_or_else(|| {
                JsErrorBox::generic(format!(
                    "Cannot resolve \"{specifier}\" from non-file module \"{referrer}\""
                ))
            })?;

        let resolved = self
            .resolver
            .resolve(specifier, &search_root)
            .map_err(|e| JsErrorBox::generic(format!("[{}] {}", e.code, e.message)))?;
        ModuleSpecifier::from_file_path(&resolved).map_err(|()| {
            JsErrorBox::generic(format!("{} is not an absolute file path", resolved.display()))
        })
    }

    fn load(
        &self,
        module_specifier: &ModuleSpecifier,
        maybe_referrer: Option<&ModuleLoadReferrer>,
        options: ModuleLoadOptions,
    ) -> ModuleLoadResponse {
        FsModuleLoader.load(module_specifier, maybe_referrer, options)
    }
}

/// File name of the synthetic entry module. It is never read from disk.
const ENTRY_MODULE_NAME: &str = "__plusfile_entry__.js";

/// Imports the artifact and copies its namespace into a plain object.
const ENTRY_MODULE: &str = r#"
import * as namespace from __ARTIFACT_SPECIFIER__;

const exports = {};
for (const key of Object.keys(namespace)) {
    exports[key] = namespace[key];
}

const json = JSON.stringify(exports, (key, value) => {
    if (value === undefined) {
        throw new TypeError(`Export value at "${key}" is undefined and cannot be captured`);
    }
    if (typeof value === "function" || typeof value === "symbol") {
        throw new TypeError(`Export value at "${key}" is a ${typeof value} and cannot be captured`);
    }
    return value;
});
Deno.core.ops.op_set_exports(json);
"#;

fn evaluation_failure(error: impl std::fmt::Display) -> LoadFailure {
    LoadFailure::Evaluate(error.to_string())
}

/// Load `artifact` as an ES module and return its exports as a plain mapping.
///
/// **MUST be called from a dedicated thread** - `JsRuntime` is not `Send`.
pub async fn evaluate_module(artifact: &Path) -> Result<Exports, LoadFailure> {
    CAPTURED_EXPORTS.with(|cell| cell.borrow_mut().take());

    let specifier = ModuleSpecifier::from_file_path(artifact).map_err(|()| {
        LoadFailure::Evaluate(format!("{} is not an absolute file path", artifact.display()))
    })?;
    let entry = specifier
        .join(ENTRY_MODULE_NAME)
        .map_err(evaluation_failure)?;
    let specifier_literal = serde_json::to_string(specifier.as_str()).map_err(evaluation_failure)?;
    let entry_code = ENTRY_MODULE.replace("__ARTIFACT_SPECIFIER__", &specifier_literal);

    let mut runtime = JsRuntime::new(RuntimeOptions {
        module_loader: Some(Rc::new(PackageModuleLoader {
            resolver: NodeResolver::import(),
        })),
        extensions: vec![plusfile_ext::init()],
        ..Default::default()
    });

    let module_id = runtime
        .load_main_es_module_from_code(&entry, entry_code)
        .await
        .map_err(evaluation_failure)?;
    let evaluation = runtime.mod_evaluate(module_id);
    runtime
        .run_event_loop(Default::default())
        .await
        .map_err(evaluation_failure)?;
    evaluation.await.map_err(evaluation_failure)?;

    let exports_json = CAPTURED_EXPORTS
        .with(|cell| cell.borrow_mut().take())
        .ok_or_else(|| LoadFailure::Evaluate("module exports were not captured".to_string()))?;

    serde_json::from_str(&exports_json).map_err(evaluation_failure)
}
