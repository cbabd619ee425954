use std::collections::HashSet;

use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::config::MediaTypesConfig;

#[derive(AsRefStr, Display, EnumIter, EnumString, Debug, PartialEq, Eq, Copy, Clone)]
#[strum(serialize_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Document,
    Text,
    Other,
}

impl MediaType {
    /// Built-in extension lists, one space-separated set per type. `Other`
    /// matches nothing and is the fallback classification.
    pub fn default_extensions(&self) -> &'static str {
        match self {
            MediaType::Image => "png jpg jpeg jfif gif webp bmp svg ico",
            MediaType::Video => "mp4 m4v webm ogv mov mkv wmv avi asf mpg mpeg flv",
            MediaType::Audio => "mp3 wav m4a ogg wma aac flac",
            MediaType::Document => "pdf doc docx ppt pptx pps ppsx odt ods odp xls xlsx",
            MediaType::Text => "txt xml csv htm html json css js",
            MediaType::Other => "",
        }
    }
}

/// Maps a MIME type to its primary extension (no leading dot).
pub fn mime_to_extension(mime_type: &str) -> Option<&'static str> {
    mime_guess::get_mime_extensions_str(mime_type).and_then(|exts| exts.first().copied())
}

/// Guesses a MIME type from a file name, falling back to octet-stream.
pub fn mime_from_name(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Extension-set driven classifier. The extension is authoritative; the MIME
/// type's top-level part is consulted only when the extension is unknown.
pub struct MediaTypeResolver {
    image: HashSet<String>,
    video: HashSet<String>,
    audio: HashSet<String>,
    document: HashSet<String>,
    text: HashSet<String>,
}

impl MediaTypeResolver {
    pub fn from_config(config: &MediaTypesConfig) -> Self {
        MediaTypeResolver {
            image: split_extensions(&config.image),
            video: split_extensions(&config.video),
            audio: split_extensions(&config.audio),
            document: split_extensions(&config.document),
            text: split_extensions(&config.text),
        }
    }

    pub fn resolve(&self, extension: &str, mime_type: &str) -> MediaType {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        if !ext.is_empty() {
            if self.image.contains(&ext) {
                return MediaType::Image;
            }
            if self.video.contains(&ext) {
                return MediaType::Video;
            }
            if self.audio.contains(&ext) {
                return MediaType::Audio;
            }
            if self.document.contains(&ext) {
                return MediaType::Document;
            }
            if self.text.contains(&ext) {
                return MediaType::Text;
            }
        }

        match mime_type.split('/').next().unwrap_or("") {
            "image" => MediaType::Image,
            "video" => MediaType::Video,
            "audio" => MediaType::Audio,
            "text" => MediaType::Text,
            _ => MediaType::Other,
        }
    }
}

fn split_extensions(list: &str) -> HashSet<String> {
    list.split_whitespace()
        .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
        .collect()
}
