//! MSBuild project reader.
//!
//! Only `Project/ItemGroup/ClInclude` and `Project/ItemGroup/ClCompile`
//! entries are read. `Include` values are resolved against the project
//! file's directory; values containing wildcards are expanded with `glob`.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const PROJECT_EXTENSION: &str = "vcxproj";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("{} is not a .vcxproj file", path.display())]
    InvalidExtension {
        /// Offending path
        path: PathBuf,
    },

    #[error("project file {} does not exist", path.display())]
    NotFound {
        /// Missing path
        path: PathBuf,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Malformed {
        /// Project file
        path: PathBuf,
        /// Parser diagnostic
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    Header,
    Source,
}

#[derive(Debug, Clone)]
pub struct Project {
    path: PathBuf,
    root: PathBuf,
    headers: Vec<PathBuf>,
    sources: Vec<PathBuf>,
}

impl Project {
    /// Validate and parse the project file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if path.extension().and_then(|e| e.to_str()) != Some(PROJECT_EXTENSION) {
            return Err(ProjectError::InvalidExtension {
                path: path.to_path_buf(),
            }
            .into());
        }
        if !path.is_file() {
            return Err(ProjectError::NotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        let xml = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let project = Self::parse(path, &xml)?;
        info!(
            "{}: {} headers, {} sources",
            path.display(),
            project.headers.len(),
            project.sources.len()
        );
        Ok(project)
    }

    /// Parse project XML; `path` locates the project for relative entries.
    pub fn parse(path: &Path, xml: &str) -> Result<Self, ProjectError> {
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut project = Project {
            path: path.to_path_buf(),
            root,
            headers: Vec::new(),
            sources: Vec::new(),
        };

        let malformed = |message: String| ProjectError::Malformed {
            path: path.to_path_buf(),
            message,
        };

        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Vec<u8>> = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    project.visit(&stack, e).map_err(&malformed)?;
                    stack.push(e.local_name().as_ref().to_vec());
                }
                Ok(Event::Empty(ref e)) => {
                    project.visit(&stack, e).map_err(&malformed)?;
                }
                Ok(Event::End(_)) => {
                    stack.pop();
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(malformed(format!(
                        "{} at byte {}",
                        e,
                        reader.error_position()
                    )))
                }
            }
        }
        if let Some(open) = stack.last() {
            return Err(malformed(format!(
                "unclosed element <{}>",
                String::from_utf8_lossy(open)
            )));
        }
        if project.headers.is_empty() && project.sources.is_empty() {
            debug!("{}: no ClInclude or ClCompile entries", path.display());
        }
        Ok(project)
    }

    /// Record `element` if it is an item directly under `Project/ItemGroup`.
    fn visit(&mut self, stack: &[Vec<u8>], element: &BytesStart) -> Result<(), String> {
        if stack.len() != 2 || stack[0] != b"Project" || stack[1] != b"ItemGroup" {
            return Ok(());
        }
        let kind = match element.local_name().as_ref() {
            b"ClInclude" => ItemKind::Header,
            b"ClCompile" => ItemKind::Source,
            _ => return Ok(()),
        };
        let mut include = None;
        for attr in element.attributes().filter_map(|a| a.ok()) {
            if attr.key.as_ref() == b"Include" {
                let value = attr.unescape_value().map_err(|e| e.to_string())?;
                include = Some(value.into_owned());
            }
        }
        let Some(include) = include else {
            warn!("{}: item without Include attribute ignored", self.path.display());
            return Ok(());
        };

        let resolved = self.resolve(&include);
        match kind {
            ItemKind::Header => self.headers.extend(resolved),
            ItemKind::Source => self.sources.extend(resolved),
        }
        Ok(())
    }

    /// Join an `Include` value to the project root, expanding wildcards.
    fn resolve(&self, include: &str) -> Vec<PathBuf> {
        let relative = include.replace('\\', "/");
        let joined = self.root.join(&relative);
        if !relative.contains(['*', '?', '[']) {
            return vec![joined];
        }
        let pattern = joined.to_string_lossy().into_owned();
        match glob::glob(&pattern) {
            Ok(paths) => {
                let mut matches: Vec<PathBuf> = paths
                    .filter_map(|r| r.ok())
                    .filter(|p| p.is_file())
                    .collect();
                matches.sort();
                if matches.is_empty() {
                    warn!("no files matched: {}", pattern);
                }
                matches
            }
            Err(e) => {
                warn!("invalid include pattern {}: {}", pattern, e);
                Vec::new()
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the project file.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `ClInclude` entries in document order.
    pub fn headers(&self) -> &[PathBuf] {
        &self.headers
    }

    /// `ClCompile` entries in document order.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project DefaultTargets="Build" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <ItemGroup Label="ProjectConfigurations">
    <ProjectConfiguration Include="Debug|x64" />
  </ItemGroup>
  <ItemGroup>
    <ClCompile Include="src\main.cpp" />
    <ClCompile Include="src\Player.cpp">
      <PrecompiledHeader>Create</PrecompiledHeader>
    </ClCompile>
  </ItemGroup>
  <ItemGroup>
    <ClInclude Include="include\Player.h" />
    <ClInclude Include="World.h" />
  </ItemGroup>
  <Target Name="Build">
    <ItemGroup>
      <ClInclude Include="nested\Ignored.h" />
    </ItemGroup>
  </Target>
</Project>
"#;

    #[test]
    fn headers_and_sources_in_document_order() {
        let project = Project::parse(Path::new("/work/Game.vcxproj"), SAMPLE).unwrap();
        assert_eq!(project.root(), Path::new("/work"));
        assert_eq!(
            project.headers(),
            &[
                PathBuf::from("/work/include/Player.h"),
                PathBuf::from("/work/World.h")
            ]
        );
        assert_eq!(
            project.sources(),
            &[
                PathBuf::from("/work/src/main.cpp"),
                PathBuf::from("/work/src/Player.cpp")
            ]
        );
    }

    #[test]
    fn empty_project_has_no_items() {
        let project = Project::parse(Path::new("p.vcxproj"), "<Project/>").unwrap();
        assert!(project.headers().is_empty());
        assert!(project.sources().is_empty());
    }

    #[test]
    fn mismatched_tags_are_malformed() {
        let err = Project::parse(
            Path::new("bad.vcxproj"),
            "<Project><ItemGroup></Project>",
        )
        .unwrap_err();
        assert!(matches!(err, ProjectError::Malformed { .. }));
        assert!(err.to_string().starts_with("failed to parse bad.vcxproj"));
    }

    #[test]
    fn unclosed_root_is_malformed() {
        let err = Project::parse(Path::new("bad.vcxproj"), "<Project><ItemGroup>").unwrap_err();
        assert!(matches!(err, ProjectError::Malformed { .. }));
    }

    #[test]
    fn wildcard_includes_expand() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("inc")).unwrap();
        fs::write(dir.path().join("inc/b.h"), "").unwrap();
        fs::write(dir.path().join("inc/a.h"), "").unwrap();
        fs::write(dir.path().join("inc/a.cpp"), "").unwrap();
        let xml = r#"<Project><ItemGroup><ClInclude Include="inc\*.h" /></ItemGroup></Project>"#;
        let project = Project::parse(&dir.path().join("x.vcxproj"), xml).unwrap();
        assert_eq!(
            project.headers(),
            &[dir.path().join("inc/a.h"), dir.path().join("inc/b.h")]
        );
    }

    #[test]
    fn load_checks_extension_and_existence() {
        let dir = TempDir::new().unwrap();
        let wrong = dir.path().join("Game.sln");
        fs::write(&wrong, SAMPLE).unwrap();
        let err = Project::load(&wrong).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProjectError>(),
            Some(ProjectError::InvalidExtension { .. })
        ));

        let missing = dir.path().join("Missing.vcxproj");
        let err = Project::load(&missing).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProjectError>(),
            Some(ProjectError::NotFound { .. })
        ));

        let good = dir.path().join("Game.vcxproj");
        fs::write(&good, SAMPLE).unwrap();
        let project = Project::load(&good).unwrap();
        assert_eq!(project.headers().len(), 2);
        assert_eq!(project.path(), good.as_path());
    }
}
