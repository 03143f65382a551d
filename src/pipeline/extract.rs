//! Image extraction strategies.
//!
//! Each backend exposes its images differently, so each gets a strategy
//! that locates the bytes and feeds them through the shared [`ImageSink`]
//! in discovery order:
//!
//! | Strategy | Source | Used by |
//! |----------|--------|---------|
//! | [`extract_base64_inline`] | `![alt](data:image/…;base64,…)` already in the Markdown | markup backend |
//! | [`extract_relationship_images`] | package relationships cross-referenced with body drawings | native and markup backends |
//! | [`collect_media_dir`] + [`rewrite_media_paths`] | files the external converter wrote to disk | pandoc backend |
//!
//! Every discovered blob reaches the sink exactly once; a failure costs one
//! image, never the document.

use crate::error::ImageError;
use crate::ooxml::{PartSource, Relationships};
use crate::pipeline::sink::ImageSink;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// File extensions treated as images when scanning a media directory.
const IMAGE_EXTENSIONS: [&str; 11] = [
    "png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff", "svg", "emf", "wmf", "webp",
];

// ── Base64-inline ────────────────────────────────────────────────────────────

static RE_DATA_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(data:image/([a-zA-Z0-9+.\-]+);base64,([A-Za-z0-9+/=\s]+)\)")
        .unwrap()
});

/// Decode every inline base64 image, hand it to the sink and substitute the
/// sink's reference in place, keeping the alt text.
///
/// Undecodable payloads are dropped with an [`ImageError::DecodeFailed`].
pub fn extract_base64_inline(markdown: &str, sink: &mut ImageSink) -> String {
    RE_DATA_IMAGE
        .replace_all(markdown, |caps: &Captures<'_>| {
            let alt = &caps[1];
            let format = &caps[2];
            let payload: String = caps[3].chars().filter(|c| !c.is_whitespace()).collect();

            let bytes = match STANDARD.decode(payload.as_bytes()) {
                Ok(b) => b,
                Err(e) => {
                    sink.record_error(ImageError::DecodeFailed {
                        index: sink.next_index(),
                        detail: e.to_string(),
                    });
                    return String::new();
                }
            };
            match sink.store(&bytes, format) {
                Some(target) => format!("![{alt}]({target})"),
                None => String::new(),
            }
        })
        .into_owned()
}

// ── Relationship parts ───────────────────────────────────────────────────────

/// References produced by [`extract_relationship_images`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipImages {
    /// One reference per body occurrence, in body order.
    pub placed: Vec<String>,
    /// Image relationships no drawing in the body points at, in
    /// relationship order. They have no position and are appended.
    pub unreferenced: Vec<String>,
}

/// Resolve body image occurrences (relationship ids, in body order) to
/// references.
///
/// A relationship used twice is stored once and its reference reused.
/// Linked (external) images have no bytes and are dropped with
/// [`ImageError::NoByteSource`].
pub fn extract_relationship_images<S: PartSource + ?Sized>(
    source: &mut S,
    rels: &Relationships,
    occurrences: &[String],
    sink: &mut ImageSink,
) -> RelationshipImages {
    if sink.mode().is_skip() {
        return RelationshipImages {
            placed: vec![String::new(); occurrences.len()],
            unreferenced: Vec::new(),
        };
    }

    let mut cache: HashMap<&str, String> = HashMap::new();
    let mut placed = Vec::with_capacity(occurrences.len());
    for rid in occurrences {
        if let Some(r) = cache.get(rid.as_str()) {
            placed.push(r.clone());
            continue;
        }
        let reference = sink_relationship(source, rels, rid, sink);
        cache.insert(rid.as_str(), reference.clone());
        placed.push(reference);
    }

    let unreferenced = rels
        .images()
        .filter(|rel| !cache.contains_key(rel.id.as_str()))
        .map(|rel| sink_relationship(source, rels, &rel.id, sink))
        .collect();

    RelationshipImages {
        placed,
        unreferenced,
    }
}

fn sink_relationship<S: PartSource + ?Sized>(
    source: &mut S,
    rels: &Relationships,
    rid: &str,
    sink: &mut ImageSink,
) -> String {
    let Some(rel) = rels.get(rid) else {
        sink.record_error(ImageError::NoByteSource {
            index: sink.next_index(),
            target: rid.to_string(),
        });
        return String::new();
    };
    if rel.external {
        sink.record_error(ImageError::NoByteSource {
            index: sink.next_index(),
            target: rel.target.clone(),
        });
        return String::new();
    }
    match source.read_part(&rel.target) {
        Ok(bytes) => {
            let ext = Path::new(&rel.target)
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            sink.process_image(&bytes, &ext)
        }
        Err(e) => {
            debug!("Image part {} unreadable: {}", rel.target, e);
            sink.record_error(ImageError::NoByteSource {
                index: sink.next_index(),
                target: rel.target.clone(),
            });
            String::new()
        }
    }
}

// ── External media directory ─────────────────────────────────────────────────

/// Lookup from the paths an external converter printed to sink references.
///
/// Lookups through [`MediaMap::claim`] mark the file as linked, so files the
/// converter extracted but never referenced can be appended afterwards.
#[derive(Debug, Clone, Default)]
pub struct MediaMap {
    root: PathBuf,
    /// Every lookup key for every file, as an index into `files`.
    keys: HashMap<String, usize>,
    /// Files in enumeration order.
    files: Vec<MediaFile>,
}

#[derive(Debug, Clone)]
struct MediaFile {
    /// Full slash-separated path, for suffix matching.
    path: String,
    /// Sink link target; `None` when the image was dropped.
    target: Option<String>,
    linked: bool,
}

impl MediaMap {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Find the link target for a path as written in the converter output.
    ///
    /// Tries, in order: the exact path, any known path whose trailing
    /// components are this one (or the reverse), then the bare file name.
    /// `Some(None)` means the file was found but its image was dropped.
    pub fn resolve(&self, path: &str) -> Option<Option<&str>> {
        self.find(path).map(|i| self.files[i].target.as_deref())
    }

    /// Like [`MediaMap::resolve`], and records the file as linked.
    pub fn claim(&mut self, path: &str) -> Option<Option<String>> {
        let i = self.find(path)?;
        let file = &mut self.files[i];
        file.linked = true;
        Some(file.target.clone())
    }

    /// Image references for stored files nothing linked to, in enumeration order.
    pub fn unlinked(&self) -> Vec<String> {
        self.files
            .iter()
            .filter(|f| !f.linked)
            .filter_map(|f| f.target.as_ref())
            .map(|t| format!("![]({t})"))
            .collect()
    }

    /// True when `path` points inside the converter's extraction directory.
    pub fn is_under_root(&self, path: &str) -> bool {
        let root = slash_path(&self.root);
        !root.is_empty() && path.replace('\\', "/").starts_with(&root)
    }

    fn find(&self, path: &str) -> Option<usize> {
        let path = path.replace('\\', "/");
        if let Some(&i) = self.keys.get(&path) {
            return Some(i);
        }
        let wanted = Path::new(path.trim_start_matches("./"));
        if wanted.as_os_str().is_empty() {
            return None;
        }
        let by_suffix = self.files.iter().position(|f| {
            let known = Path::new(&f.path);
            known.ends_with(wanted) || wanted.ends_with(known)
        });
        by_suffix.or_else(|| {
            let name = wanted.file_name()?.to_string_lossy();
            self.keys.get(name.as_ref()).copied()
        })
    }
}

/// Feed every image file under `root` to the sink in natural file-name
/// order (`image2` before `image10`) and build the lookup map.
pub fn collect_media_dir(root: &Path, sink: &mut ImageSink) -> MediaMap {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && has_image_extension(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort_by(|a, b| natural_cmp(&slash_path(a), &slash_path(b)));

    let mut map = MediaMap {
        root: root.to_path_buf(),
        ..Default::default()
    };

    for file in files {
        let target = match std::fs::read(&file) {
            Ok(bytes) => {
                let ext = file
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_default();
                sink.store(&bytes, &ext)
            }
            Err(e) => {
                sink.record_error(ImageError::NoByteSource {
                    index: sink.next_index(),
                    target: format!("{}: {}", file.display(), e),
                });
                None
            }
        };

        let full = slash_path(&file);
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rel = file
            .strip_prefix(root)
            .map(slash_path)
            .unwrap_or_else(|_| name.clone());

        let index = map.files.len();
        for key in [full.clone(), name.clone(), format!("media/{name}"), rel] {
            map.keys.entry(key).or_insert(index);
        }
        map.files.push(MediaFile {
            path: full,
            target,
            linked: false,
        });
    }
    debug!("Collected {} media files from {}", map.len(), root.display());
    map
}

static RE_MD_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"!\[((?:\\.|\[[^\]\\]*\]|[^\]\\])*)\]\((<[^>]+>|[^)\s]+)(?:\s+"[^"]*")?\)"#)
        .unwrap()
});

/// Point every Markdown image at its sink reference, marking the files it
/// links as claimed.
///
/// Unresolvable images inside the extraction directory would dangle once
/// it is deleted, so they are removed; any other image is left alone.
pub fn rewrite_media_paths(markdown: &str, map: &mut MediaMap) -> String {
    RE_MD_IMAGE
        .replace_all(markdown, |caps: &Captures<'_>| {
            let alt = &caps[1];
            let raw = caps[2].trim_start_matches('<').trim_end_matches('>');
            if raw.starts_with("data:") {
                return caps[0].to_string();
            }
            match map.claim(raw) {
                Some(Some(target)) => format!("![{alt}]({target})"),
                Some(None) => String::new(),
                None if map.is_under_root(raw) => {
                    warn!("Dropping image with no extracted file: {}", raw);
                    String::new()
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Compare strings treating digit runs as numbers.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_key(a).cmp(&natural_key(b))
}

fn natural_key(s: &str) -> Vec<(u8, u64, String)> {
    let mut key = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(&c) = chars.peek() {
        let digit = c.is_ascii_digit();
        let mut chunk = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() != digit {
                break;
            }
            chunk.push(c);
            chars.next();
        }
        if digit {
            key.push((0, chunk.parse().unwrap_or(u64::MAX), chunk));
        } else {
            key.push((1, 0, chunk.to_lowercase()));
        }
    }
    key
}
