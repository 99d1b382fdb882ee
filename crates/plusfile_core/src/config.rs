//! Plugin configuration: validation of raw fragments and their merge.
//!
//! Two raw fragments feed the merge: the options passed when invoking the
//! plugin and the `vitePluginSsr` section of the declarative config file.
//! Both are validated against the same schema before anything is read from
//! them, and the merged result is validated once more in internal mode.

use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};

use crate::error::{CoreError, Result};
use crate::shape::{assert_invariant, assert_usage, has_prop, is_object, PropType};

/// Maps `(config_name, config_name_in_object)` to a prefix telling the user
/// where the offending value was declared.
pub type InputFormat<'a> = &'a dyn Fn(&str, &str) -> String;

/// Prefix for values passed when invoking the plugin.
pub fn plugin_options_format(config_name: &str, config_name_in_object: &str) -> String {
    format!("[vite.config.js][`ssr({{ {config_name_in_object} }})`] `{config_name}`")
}

/// Prefix for values declared in the config file.
pub fn config_file_format(config_name: &str, _config_name_in_object: &str) -> String {
    format!("vite.config.js#vitePluginSsr.{config_name}")
}

/// A raw fragment together with the format used to report its errors.
#[derive(Clone, Copy)]
pub struct ConfigSource<'a> {
    pub value: &'a Value,
    pub format: InputFormat<'a>,
}

impl<'a> ConfigSource<'a> {
    pub fn new(value: &'a Value, format: InputFormat<'a>) -> Self {
        Self { value, format }
    }

    /// Fragment coming from the plugin invocation.
    pub fn plugin_options(value: &'a Value) -> Self {
        Self::new(value, &plugin_options_format)
    }

    /// Fragment coming from the declarative config file.
    pub fn config_file(value: &'a Value) -> Self {
        Self::new(value, &config_file_format)
    }
}

/// Fully validated plugin configuration.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedConfig {
    pub disable_build_chaining: bool,
    /// `None` means prerendering is disabled and is written as `false`.
    #[serde(serialize_with = "serialize_prerender")]
    pub prerender: Option<PrerenderOptions>,
    pub page_files: PageFilesConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerenderOptions {
    pub partial: bool,
    pub no_extra_dir: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<Number>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PageFilesConfig {
    pub include: Vec<String>,
}

fn serialize_prerender<S: Serializer>(
    prerender: &Option<PrerenderOptions>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match prerender {
        Some(options) => options.serialize(serializer),
        None => serializer.serialize_bool(false),
    }
}

/// Merge the two raw fragments using the default error formats.
pub fn merge_config(from_invocation: &Value, from_file: &Value) -> Result<NormalizedConfig> {
    merge_sources(
        ConfigSource::plugin_options(from_invocation),
        ConfigSource::config_file(from_file),
    )
}

/// Validate both sources, merge them and re-check the merged result.
///
/// The invocation source takes precedence field by field.
pub fn merge_sources(
    from_invocation: ConfigSource<'_>,
    from_file: ConfigSource<'_>,
) -> Result<NormalizedConfig> {
    assert_config(from_invocation.value, Some(from_invocation.format))?;
    assert_config(from_file.value, Some(from_file.format))?;

    let merged = merge_validated(from_invocation.value, from_file.value);

    let serialized =
        serde_json::to_value(&merged).map_err(|e| CoreError::Internal(e.to_string()))?;
    assert_config(&serialized, None)?;

    Ok(merged)
}

/// Check that a resolved build config carries a valid `vitePluginSsr` section.
pub fn assert_resolved_config(resolved: &Value) -> Result<NormalizedConfig> {
    assert_invariant(
        has_prop(resolved, "vitePluginSsr", PropType::Object),
        "resolved build config has no `vitePluginSsr` object",
    )?;
    let section = &resolved["vitePluginSsr"];
    assert_config(section, None)?;

    Ok(merge_validated(section, &Value::Object(Map::new())))
}

/// Validate a raw fragment against the config schema.
///
/// With a format, violations are usage errors prefixed by the format's
/// output. Without one, they are internal invariant violations.
pub fn assert_config(value: &Value, format: Option<InputFormat<'_>>) -> Result<()> {
    assert_invariant(is_object(value), "config fragment is not an object")?;
    let checker = Checker { format };

    checker.check(
        "disableBuildChaining",
        "should be a boolean (or undefined)",
        has_prop(value, "disableBuildChaining", PropType::Boolean)
            || has_prop(value, "disableBuildChaining", PropType::Undefined),
    )?;
    checker.check_page_files(value)?;
    checker.check_prerender(value)
}

struct Checker<'a> {
    format: Option<InputFormat<'a>>,
}

impl Checker<'_> {
    fn check_prerender(&self, value: &Value) -> Result<()> {
        self.check(
            "prerender",
            "should be an object or a boolean",
            has_prop(value, "prerender", PropType::Object)
                || has_prop(value, "prerender", PropType::Boolean)
                || has_prop(value, "prerender", PropType::Undefined),
        )?;

        let Some(prerender) = value.get("prerender").filter(|p| is_object(p)) else {
            return Ok(());
        };
        self.check(
            "prerender.partial",
            "should be a boolean (or undefined)",
            has_prop(prerender, "partial", PropType::Undefined)
                || has_prop(prerender, "partial", PropType::Boolean),
        )?;
        self.check(
            "prerender.noExtraDir",
            "should be a boolean (or undefined)",
            has_prop(prerender, "noExtraDir", PropType::Undefined)
                || has_prop(prerender, "noExtraDir", PropType::Boolean),
        )?;
        self.check(
            "prerender.parallel",
            "should be a number (or undefined)",
            has_prop(prerender, "parallel", PropType::Undefined)
                || has_prop(prerender, "parallel", PropType::Number),
        )
    }

    fn check_page_files(&self, value: &Value) -> Result<()> {
        self.check(
            "pageFiles",
            "should be an object (or undefined)",
            has_prop(value, "pageFiles", PropType::Undefined)
                || has_prop(value, "pageFiles", PropType::Object),
        )?;

        let Some(page_files) = value.get("pageFiles") else {
            return Ok(());
        };
        if page_files.get("include").is_none() {
            return Ok(());
        }
        self.check(
            "pageFiles.include",
            "should be a string array (or undefined)",
            has_prop(page_files, "include", PropType::StringArray),
        )
    }

    fn check(&self, config_name: &str, expectation: &str, condition: bool) -> Result<()> {
        let Some(format) = self.format else {
            return assert_invariant(condition, format!("`{config_name}` {expectation}"));
        };

        let path: Vec<&str> = config_name.split('.').collect();
        assert_invariant(path.len() <= 2, format!("config name `{config_name}` is too deep"))?;
        let config_name_in_object = match path.as_slice() {
            [parent, child] => format!("{parent}: {{ {child} }}"),
            _ => config_name.to_string(),
        };

        assert_usage(
            condition,
            format!("{} {expectation}", format(config_name, &config_name_in_object)),
        )
    }
}

/// First value that is present and not null.
fn first_defined<'v>(candidates: [Option<&'v Value>; 2]) -> Option<&'v Value> {
    candidates.into_iter().flatten().find(|v| !v.is_null())
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => true,
    }
}

/// Options object of a validated `prerender` value; booleans count as `{}`.
fn prerender_options(value: &Value) -> Option<&Map<String, Value>> {
    value.get("prerender").and_then(Value::as_object)
}

fn include_list(value: &Value) -> impl Iterator<Item = String> + '_ {
    value
        .get("pageFiles")
        .and_then(|p| p.get("include"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.as_str().map(str::to_owned))
}

/// Merge two fragments that already passed [`assert_config`].
fn merge_validated(from_invocation: &Value, from_file: &Value) -> NormalizedConfig {
    let disable_build_chaining = first_defined([
        from_invocation.get("disableBuildChaining"),
        from_file.get("disableBuildChaining"),
    ])
    .and_then(Value::as_bool)
    .unwrap_or(false);

    let prerender = if truthy(from_invocation.get("prerender"))
        || truthy(from_file.get("prerender"))
    {
        let invocation = prerender_options(from_invocation);
        let file = prerender_options(from_file);
        let field = |name: &str| {
            first_defined([
                invocation.and_then(|o| o.get(name)),
                file.and_then(|o| o.get(name)),
            ])
        };

        Some(PrerenderOptions {
            partial: field("partial").and_then(Value::as_bool).unwrap_or(false),
            no_extra_dir: field("noExtraDir").and_then(Value::as_bool).unwrap_or(false),
            parallel: match field("parallel") {
                Some(Value::Number(n)) => Some(n.clone()),
                _ => None,
            },
        })
    } else {
        None
    };

    let include = include_list(from_invocation)
        .chain(include_list(from_file))
        .collect();

    NormalizedConfig {
        disable_build_chaining,
        prerender,
        page_files: PageFilesConfig { include },
    }
}
