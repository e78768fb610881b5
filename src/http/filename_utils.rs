use percent_encoding::percent_decode_str;
use reqwest::Url;

const FALLBACK_FILENAME: &str = "download";

pub(super) fn percent_decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().to_string()
}

pub(super) fn extract_filename_from_url(raw_url: &str) -> Option<String> {
    let url = Url::parse(raw_url).ok()?;
    let segment = url.path_segments()?.next_back()?;
    let filename = percent_decode(segment).replace(['/', '\\'], "_");
    (!filename.is_empty() && filename != "." && filename != "..").then_some(filename)
}

pub(super) fn extract_filename(raw_url: &str) -> String {
    extract_filename_from_url(raw_url).unwrap_or_else(|| String::from(FALLBACK_FILENAME))
}
