//! HCL configuration loader.
//!
//! Expressions come from `hcl-rs`; line numbers come from the spans of an
//! `hcl-edit` parse of the same file, matched up by declaration order.

use crate::error::{Result, TfProbeError};
use crate::parser::{
    Attribute, ConfigLoader, Module, ModuleCall, Resource, Variable, MODULE_META_ARGUMENTS,
    TERRAFORM_EXTENSIONS,
};
use crate::types::Location;

use hcl::{Block, Body, Expression};
use hcl_edit::structure::Structure;
use hcl_edit::Span;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Loads `.tf` directories with `hcl-rs`.
///
/// Only the files directly inside a module directory belong to it;
/// subdirectories are separate modules reached through module calls.
#[derive(Debug, Clone, Default)]
pub struct HclLoader;

/// Line numbers of one top-level block.
#[derive(Debug, Default)]
struct BlockLines {
    line: usize,
    attributes: HashMap<String, usize>,
}

/// Line information for one file, in block declaration order.
#[derive(Debug, Default)]
struct LineIndex {
    blocks: Vec<BlockLines>,
    attributes: HashMap<String, usize>,
}

/// Declarations parsed from a single file.
#[derive(Debug, Default)]
struct ParsedFile {
    variables: Vec<Variable>,
    resources: Vec<Resource>,
    module_calls: Vec<ModuleCall>,
}

impl HclLoader {
    /// Create a new loader.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Configuration files directly inside `dir`, sorted by name.
    fn config_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed"));
                TfProbeError::io(dir, source, file!(), line!())
            })?;
            if entry.file_type().is_file() && is_config_file(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn read(path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| TfProbeError::io(path, e, file!(), line!()))
    }

    /// Parse one file's content.
    fn parse_content(content: &str, file: &Path) -> Result<ParsedFile> {
        let (body, lines) = parse_with_lines(content, file)?;
        let mut parsed = ParsedFile::default();

        for (block, block_lines) in body.blocks().zip(lines.blocks.iter()) {
            let location = Location::new(file, block_lines.line);
            match block.identifier.as_str() {
                "variable" => parsed
                    .variables
                    .push(parse_variable(block, block_lines, location)?),
                "resource" => parsed
                    .resources
                    .push(parse_resource(block, block_lines, location)?),
                "module" => parsed
                    .module_calls
                    .push(parse_module_call(block, block_lines, location)?),
                other => {
                    tracing::trace!(file = %file.display(), block = other, "Ignoring block");
                }
            }
        }

        Ok(parsed)
    }
}

impl ConfigLoader for HclLoader {
    fn load_module(&self, dir: &Path) -> Result<Module> {
        if !dir.is_dir() {
            return Err(crate::err!(DirectoryNotFound {
                path: dir.to_path_buf(),
            }));
        }

        let mut module = Module {
            dir: dir.to_path_buf(),
            ..Module::default()
        };

        for file in Self::config_files(dir)? {
            tracing::debug!(file = %file.display(), "Parsing file");
            let content = Self::read(&file)?;
            let parsed = Self::parse_content(&content, &file)?;

            for variable in parsed.variables {
                insert_unique(&mut module.variables, variable.name.clone(), variable, "variable", &file)?;
            }
            for resource in parsed.resources {
                insert_unique(&mut module.managed_resources, resource.address(), resource, "resource", &file)?;
            }
            for call in parsed.module_calls {
                insert_unique(&mut module.module_calls, call.name.clone(), call, "module call", &file)?;
            }
            module.files.push(file);
        }

        tracing::debug!(
            dir = %dir.display(),
            files = module.files.len(),
            variables = module.variables.len(),
            resources = module.managed_resources.len(),
            module_calls = module.module_calls.len(),
            "Loaded module"
        );

        Ok(module)
    }

    fn load_values_file(&self, path: &Path) -> Result<IndexMap<String, Attribute>> {
        if !path.is_file() {
            return Err(crate::err!(FileNotFound {
                path: path.to_path_buf(),
            }));
        }
        let content = Self::read(path)?;
        let (body, lines) = parse_with_lines(&content, path)?;

        if let Some(block) = body.blocks().next() {
            return Err(crate::err!(ValuesFile {
                file: path.to_path_buf(),
                message: format!("blocks are not allowed in a variables file (found \"{}\")", block.identifier),
            }));
        }

        let mut values = IndexMap::new();
        for attr in body.attributes() {
            let name = attr.key.as_str().to_string();
            let line = lines.attributes.get(&name).copied().unwrap_or(1);
            values.insert(
                name.clone(),
                Attribute {
                    name,
                    expr: attr.expr.clone(),
                    location: Location::new(path, line),
                },
            );
        }
        Ok(values)
    }
}

fn is_config_file(path: &Path) -> bool {
    let path_str = path.to_string_lossy();
    TERRAFORM_EXTENSIONS.iter().any(|ext| path_str.ends_with(ext))
}

/// Parse `content` with both parsers and index the line of every
/// top-level block and attribute.
fn parse_with_lines(content: &str, file: &Path) -> Result<(Body, LineIndex)> {
    let edit_body = hcl_edit::parser::parse_body(content)
        .map_err(|e| TfProbeError::hcl_parse(file.to_path_buf(), e.to_string(), None, file!(), line!()))?;
    let body: Body = hcl::from_str(content)
        .map_err(|e| TfProbeError::hcl_parse(file.to_path_buf(), e.to_string(), None, file!(), line!()))?;

    let mut index = LineIndex::default();
    for structure in edit_body.iter() {
        match structure {
            Structure::Block(block) => {
                let mut lines = BlockLines {
                    line: line_of(content, block.span()),
                    attributes: HashMap::new(),
                };
                for inner in block.body.iter() {
                    if let Structure::Attribute(attr) = inner {
                        lines
                            .attributes
                            .insert(attr.key.as_str().to_string(), line_of(content, attr.span()));
                    }
                }
                index.blocks.push(lines);
            }
            Structure::Attribute(attr) => {
                index
                    .attributes
                    .insert(attr.key.as_str().to_string(), line_of(content, attr.span()));
            }
        }
    }

    Ok((body, index))
}

/// 1-based line of the start of `span`.
fn line_of(content: &str, span: Option<Range<usize>>) -> usize {
    span.map_or(1, |range| {
        let end = range.start.min(content.len());
        content.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
    })
}

fn insert_unique<T>(
    map: &mut IndexMap<String, T>,
    key: String,
    value: T,
    kind: &str,
    file: &Path,
) -> Result<()> {
    if map.contains_key(&key) {
        return Err(crate::err!(HclStructure {
            file: file.to_path_buf(),
            message: format!("duplicate {kind} \"{key}\""),
        }));
    }
    map.insert(key, value);
    Ok(())
}

fn block_label<'a>(block: &'a Block, index: usize, what: &str, location: &Location) -> Result<&'a str> {
    block.labels.get(index).map(|l| l.as_str()).ok_or_else(|| {
        crate::err!(HclStructure {
            file: location.file.clone(),
            message: format!("{} block at line {} is missing its {what} label", block.identifier, location.line),
        })
    })
}

fn block_attributes(block: &Block, lines: &BlockLines, file: &Path) -> IndexMap<String, Attribute> {
    block
        .body
        .attributes()
        .map(|attr| {
            let name = attr.key.as_str().to_string();
            let line = lines.attributes.get(&name).copied().unwrap_or(1);
            (
                name.clone(),
                Attribute {
                    name,
                    expr: attr.expr.clone(),
                    location: Location::new(file, line),
                },
            )
        })
        .collect()
}

fn parse_variable(block: &Block, lines: &BlockLines, location: Location) -> Result<Variable> {
    let name = block_label(block, 0, "name", &location)?.to_string();
    let mut attributes = block_attributes(block, lines, &location.file);
    let description = match attributes.get("description").map(|a| &a.expr) {
        Some(Expression::String(s)) => Some(s.clone()),
        _ => None,
    };
    Ok(Variable {
        name,
        default: attributes.shift_remove("default"),
        description,
        location,
    })
}

fn parse_resource(block: &Block, lines: &BlockLines, location: Location) -> Result<Resource> {
    let resource_type = block_label(block, 0, "type", &location)?.to_string();
    let name = block_label(block, 1, "name", &location)?.to_string();
    Ok(Resource {
        resource_type,
        name,
        attributes: block_attributes(block, lines, &location.file),
        location,
    })
}

fn parse_module_call(block: &Block, lines: &BlockLines, location: Location) -> Result<ModuleCall> {
    let name = block_label(block, 0, "name", &location)?.to_string();
    let mut attributes = block_attributes(block, lines, &location.file);

    let source = match attributes.get("source").map(|a| &a.expr) {
        Some(Expression::String(s)) => s.clone(),
        Some(_) => {
            return Err(crate::err!(HclStructure {
                file: location.file.clone(),
                message: format!("module \"{name}\": source must be a literal string"),
            }))
        }
        None => {
            return Err(crate::err!(HclStructure {
                file: location.file.clone(),
                message: format!("module \"{name}\" is missing the required \"source\" argument"),
            }))
        }
    };
    let version = match attributes.get("version").map(|a| &a.expr) {
        Some(Expression::String(s)) => Some(s.clone()),
        _ => None,
    };
    attributes.retain(|key, _| !MODULE_META_ARGUMENTS.contains(&key.as_str()));

    Ok(ModuleCall {
        name,
        source,
        version,
        attributes,
        location,
    })
}
