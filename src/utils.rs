use std::path::Path;

use indicatif::ProgressStyle;
use regex::Regex;

/// 进度条样式
pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

/// 由逗号分隔的后缀列表构建不区分大小写的匹配规则，如 `mp4.npy,npy`
pub fn suffix_regex(suffix: &str) -> Result<Regex, regex::Error> {
    let alternatives =
        suffix.split(',').map(|s| regex::escape(s.trim())).collect::<Vec<_>>().join("|");
    Regex::new(&format!("(?i)\\.({alternatives})$"))
}

/// 描述符文件对应的视频源路径，即去掉末尾的 `.npy`
pub fn source_path(descriptor_path: &Path) -> String {
    let path = descriptor_path.to_string_lossy();
    match path.len().checked_sub(4) {
        Some(n) if path.is_char_boundary(n) && path[n..].eq_ignore_ascii_case(".npy") => {
            path[..n].to_string()
        }
        _ => path.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case("videos/a.mp4.npy", "videos/a.mp4")]
    #[case("videos/a.NPY", "videos/a")]
    #[case("videos/a.mp4", "videos/a.mp4")]
    #[case("npy", "npy")]
    fn test_source_path(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(source_path(Path::new(input)), expected);
    }

    #[test]
    fn test_suffix_regex() {
        let re = suffix_regex("npy, feat.bin").unwrap();
        assert!(re.is_match("a/b.mp4.npy"));
        assert!(re.is_match("a/b.NPY"));
        assert!(re.is_match("a/b.feat.bin"));
        assert!(!re.is_match("a/b.featxbin"));
        assert!(!re.is_match("a/b.npy.txt"));
    }
}
