//! Layered key/value settings: built-in defaults, then the taskflowrc
//! file (and anything it includes), then command-line overrides.

use std::collections::{
  BTreeMap,
  HashSet
};
use std::fmt;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow,
  bail
};
use chrono_tz::Tz;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::datetime::resolve_timezone;

pub const RC_ENV_VAR: &str =
  "TASKFLOWRC";

const MAX_INCLUDE_DEPTH: usize = 8;

const DEFAULTS: &[(&str, &str)] = &[
  ("backend", "memory"),
  ("data.location", "~/.taskflow"),
  ("default.category", "general"),
  ("timezone", "UTC"),
  ("color", "on"),
  ("memory.latency_ms", "0"),
  ("api.timeout_secs", "30"),
  ("api.task_table", "task"),
  ("api.category_table", "category"),
  ("api.tag_table", "Test"),
  ("api.tag_field", "Tags"),
  ("categories.source", "tags")
];

/// Where a setting's current value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
  Default,
  File(PathBuf),
  Override
}

impl fmt::Display for Origin {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Self::Default => {
        f.write_str("default")
      }
      | Self::File(path) => {
        write!(f, "{}", path.display())
      }
      | Self::Override => {
        f.write_str("override")
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Setting {
  value:  String,
  origin: Origin
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RcLine<'a> {
  Include(&'a str),
  Assign(&'a str, &'a str)
}

/// Splits one rc line into an include or an assignment. Blank lines and
/// comments yield `None`.
fn parse_rc_line(
  raw: &str
) -> Option<Result<RcLine<'_>, ()>> {
  let content = match raw.find('#') {
    | Some(idx) => &raw[..idx],
    | None => raw
  }
  .trim();

  if content.is_empty() {
    return None;
  }

  if let Some(target) =
    content.strip_prefix("include ")
  {
    return Some(Ok(RcLine::Include(
      target.trim()
    )));
  }

  Some(
    content
      .split_once('=')
      .map(|(k, v)| {
        RcLine::Assign(k.trim(), v.trim())
      })
      .filter(|line| {
        !matches!(line, RcLine::Assign("", _))
      })
      .ok_or(())
  )
}

#[derive(Debug, Clone)]
pub struct Config {
  settings:         BTreeMap<String, Setting>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let settings = DEFAULTS
      .iter()
      .map(|(key, value)| {
        (
          key.to_string(),
          Setting {
            value:  value.to_string(),
            origin: Origin::Default
          }
        )
      })
      .collect();

    Self {
      settings,
      loaded_files: vec![]
    }
  }
}

impl Config {
  /// Defaults overlaid with the rc file found by [`resolve_rc_path`].
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    match resolve_rc_path(rc_override) {
      | Some(path) => {
        info!(rc = %path.display(), "loading taskflowrc");
        let mut seen = HashSet::new();
        cfg.read_rc(&path, 0, &mut seen)?;
      }
      | None => {
        debug!(
          "no taskflowrc found; using \
           defaults"
        );
      }
    }

    Ok(cfg)
  }

  /// Applies `key=value` pairs from the command line. A leading `rc.`
  /// is accepted and dropped.
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (raw_key, value) in overrides {
      let key = raw_key
        .strip_prefix("rc.")
        .map_or_else(
          || raw_key.clone(),
          str::to_string
        );
      debug!(%key, %value, "applying override");
      self.put(key, value, Origin::Override);
    }
  }

  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) {
    self.put(
      key.to_string(),
      value.to_string(),
      Origin::Override
    );
  }

  fn put(
    &mut self,
    key: String,
    value: String,
    origin: Origin
  ) {
    self
      .settings
      .insert(key, Setting { value, origin });
  }

  /// Trimmed value; blank counts as unset.
  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    let value =
      self.settings.get(key)?.value.trim();
    (!value.is_empty())
      .then(|| value.to_string())
  }

  pub fn get_or(
    &self,
    key: &str,
    fallback: &str
  ) -> String {
    self
      .get(key)
      .unwrap_or_else(|| fallback.to_string())
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) = self.get(key) else {
      return Ok(None);
    };
    parse_bool(&raw).map(Some).ok_or_else(
      || {
        anyhow!(
          "{key} must be on or off, \
           got '{raw}'"
        )
      }
    )
  }

  pub fn get_u64(
    &self,
    key: &str
  ) -> anyhow::Result<Option<u64>> {
    let Some(raw) = self.get(key) else {
      return Ok(None);
    };
    raw.parse::<u64>().map(Some).with_context(
      || {
        format!(
          "{key} must be a \
           non-negative integer, got \
           '{raw}'"
        )
      }
    )
  }

  pub fn origin(
    &self,
    key: &str
  ) -> Option<&Origin> {
    self
      .settings
      .get(key)
      .map(|s| &s.origin)
  }

  pub fn default_category(
    &self
  ) -> String {
    self.get_or(
      "default.category",
      "general"
    )
  }

  pub fn timezone(&self) -> Tz {
    resolve_timezone(
      self.get("timezone").as_deref()
    )
  }

  /// Every setting in key order, with its origin.
  pub fn entries(
    &self
  ) -> impl Iterator<Item = (&str, &str, &Origin)>
  {
    self.settings.iter().map(|(k, s)| {
      (
        k.as_str(),
        s.value.as_str(),
        &s.origin
      )
    })
  }

  fn read_rc(
    &mut self,
    path: &Path,
    depth: usize,
    seen: &mut HashSet<PathBuf>
  ) -> anyhow::Result<()> {
    if depth > MAX_INCLUDE_DEPTH {
      bail!(
        "includes nested deeper than \
         {MAX_INCLUDE_DEPTH} at {}",
        path.display()
      );
    }

    let path = expand_tilde(path);
    if !seen.insert(path.clone()) {
      warn!(rc = %path.display(), "include cycle; skipping");
      return Ok(());
    }

    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "cannot read {}",
          path.display()
        )
      })?;
    self.loaded_files.push(path.clone());

    let base_dir = path
      .parent()
      .map_or_else(
        || PathBuf::from("."),
        Path::to_path_buf
      );

    for (idx, raw) in
      text.lines().enumerate()
    {
      let lineno = idx + 1;
      let Some(parsed) = parse_rc_line(raw)
      else {
        continue;
      };

      match parsed {
        | Ok(RcLine::Include(target)) => {
          if target.is_empty() {
            bail!(
              "{}:{lineno}: include \
               needs a path",
              path.display()
            );
          }
          let target =
            base_dir.join(expand_tilde(
              Path::new(target)
            ));
          if target.exists() {
            trace!(from = %path.display(), include = %target.display(), lineno, "following include");
            self.read_rc(
              &target,
              depth + 1,
              seen
            )?;
          } else {
            warn!(include = %target.display(), "include file missing; skipping");
          }
        }
        | Ok(RcLine::Assign(key, value)) => {
          trace!(key, value, "rc setting");
          self.put(
            key.to_string(),
            value.to_string(),
            Origin::File(path.clone())
          );
        }
        | Err(()) => {
          return Err(anyhow!(
            "{}:{lineno}: expected \
             key = value, got '{}'",
            path.display(),
            raw.trim()
          ));
        }
      }
    }

    Ok(())
  }
}

/// `--data` wins, then `data.location`, then `~/.taskflow`. The
/// directory is created by the file store, not here.
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  if let Some(dir) = override_dir {
    return Ok(dir.to_path_buf());
  }
  if let Some(location) =
    cfg.get("data.location")
  {
    return Ok(expand_tilde(Path::new(
      &location
    )));
  }
  dirs::home_dir()
    .map(|home| home.join(".taskflow"))
    .ok_or_else(|| {
      anyhow!(
        "no home directory; pass \
         --data"
      )
    })
}

/// `--taskflowrc`, then `$TASKFLOWRC` (`/dev/null` disables the rc
/// file), then `~/.taskflowrc` when it exists.
pub fn resolve_rc_path(
  explicit: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = explicit {
    return Some(path.to_path_buf());
  }

  if let Ok(from_env) =
    std::env::var(RC_ENV_VAR)
  {
    return (from_env != "/dev/null")
      .then(|| PathBuf::from(from_env));
  }

  dirs::home_dir()
    .map(|home| home.join(".taskflowrc"))
    .filter(|candidate| {
      candidate.exists()
    })
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s.trim().to_ascii_lowercase().as_str()
  {
    | "1" | "y" | "yes" | "on" | "true" => {
      Some(true)
    }
    | "0" | "n" | "no" | "off" | "false" => {
      Some(false)
    }
    | _ => None
  }
}
