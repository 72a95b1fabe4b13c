use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Text,
    Binary,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            MediaKind::Image => "image",
            MediaKind::Text => "text",
            MediaKind::Binary => "binary",
        };
        f.pad(name)
    }
}

/// Broad kind plus the MIME type to hand a viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MediaType {
    pub kind: MediaKind,
    pub mime: &'static str,
}

const OCTET_STREAM: &str = "application/octet-stream";

static IMAGE_TYPES: &[(&str, &str)] = &[
    ("svg", "image/svg+xml"),
    ("bmp", "image/bmp"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("ico", "image/vnd.microsoft.icon"),
];

static TEXT_TYPES: &[(&str, &str)] = &[
    ("json", "application/json"),
    ("xml", "text/xml"),
    ("html", "text/html"),
    ("txt", "text/plain"),
    ("md", "text/plain"),
    ("toml", "text/plain"),
    ("css", "text/plain"),
    ("c", "text/plain"),
    ("cpp", "text/plain"),
    ("java", "text/plain"),
    ("js", "text/plain"),
    ("ts", "text/plain"),
    ("cjs", "text/plain"),
    ("mjs", "text/plain"),
    ("jsx", "text/plain"),
    ("tsx", "text/plain"),
    ("gitignore", "text/plain"),
    ("svelte", "text/plain"),
    ("vue", "text/plain"),
    ("go", "text/plain"),
    ("rs", "text/plain"),
    ("py", "text/plain"),
    ("dart", "text/plain"),
];

/// Guess the media type of a file from the extension of its name. A name
/// without a dot is looked up whole, so `Makefile` is binary but
/// `.gitignore` and `gitignore` are text.
pub fn infer(name: &str) -> MediaType {
    let base = name.rsplit('/').next().unwrap_or(name);
    let ext = match base.rfind('.') {
        Some(pos) => &base[pos + 1..],
        None => base,
    }
    .to_ascii_lowercase();

    let lookup = |table: &[(&str, &'static str)]| table.iter().find(|(e, _)| *e == ext).map(|(_, m)| *m);

    if let Some(mime) = lookup(IMAGE_TYPES) {
        return MediaType {
            kind: MediaKind::Image,
            mime,
        };
    }
    if let Some(mime) = lookup(TEXT_TYPES) {
        return MediaType {
            kind: MediaKind::Text,
            mime,
        };
    }
    MediaType {
        kind: MediaKind::Binary,
        mime: OCTET_STREAM,
    }
}
