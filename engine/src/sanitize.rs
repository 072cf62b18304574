//! Filename sanitation for model-suggested document names.
//!
//! The classification service returns free text; this module turns it into a
//! safe, bounded filename stem. [`sanitize`] applies an ordered list of
//! cleanup rules (each rule operates on the output of the previous one) and
//! [`truncate_stem`] bounds the result without cutting mid-word.

use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::FolderConfig;

/// Name substituted when sanitation leaves nothing usable.
pub const FALLBACK_NAME: &str = "名称未設定";

/// Lower clamp for the configured maximum stem length.
pub const MIN_STEM_LEN: usize = 20;

/// Upper clamp for the configured maximum stem length.
pub const MAX_STEM_LEN: usize = 80;

/// A break-character cut is only taken when the kept prefix is at least this long.
const MIN_BREAK_PREFIX: usize = 10;

/// Natural break characters, probed backward from the length limit.
const BREAK_CHARS: [char; 8] = ['　', '、', '（', '(', '・', ' ', '-', '_'];

/// Leading label the model sometimes prefixes its answer with.
static LABEL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(ファイル名|タイトル|題名)[:：]\s*").expect("valid regex"));

/// An 8-digit date already embedded in the name (`19xxxxxx` / `20xxxxxx`).
static DATE_STAMP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(19|20)\d{6}").expect("valid regex"));

/// Runs of two or more whitespace characters.
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

/// Cleans raw model output into a filename stem.
///
/// Applies, in order: first line only, label-prefix strip, explanation-phrase
/// and sentence truncation, quote and forbidden-character removal, control
/// character removal, whitespace collapsing, optional date suffix, and the
/// fallback substitution for empty results.
#[must_use]
pub fn sanitize(raw: &str, folder: &FolderConfig) -> String {
    sanitize_at(raw, folder, Local::now().date_naive())
}

/// [`sanitize`] with an explicit "today" for the date-suffix rule.
fn sanitize_at(raw: &str, folder: &FolderConfig, today: NaiveDate) -> String {
    let mut name = raw.lines().next().unwrap_or("").trim().to_string();

    name = LABEL_PREFIX.replace(&name, "").into_owned();

    if let Some(pos) = name.find("この文書は") {
        name.truncate(pos);
    }
    if let Some(pos) = name.find('。') {
        name.truncate(pos);
    }

    let name: String = name
        .trim()
        .chars()
        .filter(|c| !is_quote(*c) && !is_forbidden(*c) && !c.is_control())
        .collect();

    let mut name = WHITESPACE_RUN.replace_all(&name, " ").trim().to_string();

    if folder.include_date && !DATE_STAMP.is_match(&name) {
        name.push('_');
        name.push_str(&today.format("%Y%m%d").to_string());
    }

    if name.is_empty() {
        name = FALLBACK_NAME.to_string();
    }

    name
}

/// Quote characters stripped from suggestions.
fn is_quote(c: char) -> bool {
    matches!(c, '「' | '」' | '"' | '\'' | '\u{201C}' | '\u{201D}' | '\u{2018}' | '\u{2019}')
}

/// Characters that are illegal in filenames on at least one supported platform.
fn is_forbidden(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
}

/// Bounds a stem to `max_len` characters, preferring a natural break.
///
/// `max_len` is clamped to `[MIN_STEM_LEN, MAX_STEM_LEN]`. When the name is
/// too long, the nearest break character at or before the limit wins if the
/// kept prefix is at least 10 characters; otherwise the name is hard-cut at
/// exactly `max_len` characters.
#[must_use]
pub fn truncate_stem(name: &str, max_len: usize) -> String {
    let max_len = max_len.clamp(MIN_STEM_LEN, MAX_STEM_LEN);
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_len {
        return name.to_string();
    }

    let cut = (0..=max_len)
        .rev()
        .find(|&i| BREAK_CHARS.contains(&chars[i]));

    match cut {
        Some(pos) if pos >= MIN_BREAK_PREFIX => chars[..pos].iter().collect(),
        _ => chars[..max_len].iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder() -> FolderConfig {
        FolderConfig::new("/scans")
    }

    fn dated_folder() -> FolderConfig {
        FolderConfig {
            include_date: true,
            ..FolderConfig::new("/scans")
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn keeps_only_first_line() {
        assert_eq!(
            sanitize_at("見積書\nこの文書は株式会社ABCの見積書です", &folder(), today()),
            "見積書"
        );
    }

    #[test]
    fn strips_label_prefixes() {
        assert_eq!(sanitize_at("ファイル名：見積書", &folder(), today()), "見積書");
        assert_eq!(sanitize_at("タイトル: 契約書", &folder(), today()), "契約書");
        assert_eq!(sanitize_at("題名：議事録", &folder(), today()), "議事録");
    }

    #[test]
    fn explanation_sentence_becomes_fallback() {
        assert_eq!(
            sanitize_at("この文書は見積書です。", &folder(), today()),
            FALLBACK_NAME
        );
    }

    #[test]
    fn truncates_at_full_width_period() {
        assert_eq!(
            sanitize_at("請求書。添付の通りです", &folder(), today()),
            "請求書"
        );
    }

    #[test]
    fn strips_quotes() {
        assert_eq!(sanitize_at("「見積書」", &folder(), today()), "見積書");
        assert_eq!(sanitize_at("\u{201C}Invoice\u{201D}", &folder(), today()), "Invoice");
        assert_eq!(sanitize_at("'契約書'", &folder(), today()), "契約書");
    }

    #[test]
    fn strips_forbidden_characters() {
        let out = sanitize_at("契約<書>:試/\\案|?*", &folder(), today());
        for c in ['<', '>', ':', '"', '/', '\\', '|', '?', '*'] {
            assert!(!out.contains(c), "{c:?} survived sanitation: {out}");
        }
    }

    #[test]
    fn strips_control_characters() {
        let out = sanitize_at("見積\u{0001}書\u{001F}", &folder(), today());
        assert_eq!(out, "見積書");
        assert!(out.chars().all(|c| !c.is_control()));
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(
            sanitize_at("見積書   株式会社ABC", &folder(), today()),
            "見積書 株式会社ABC"
        );
    }

    #[test]
    fn appends_date_when_configured() {
        assert_eq!(
            sanitize_at("契約書", &dated_folder(), today()),
            "契約書_20240615"
        );
    }

    #[test]
    fn skips_date_when_already_present() {
        assert_eq!(
            sanitize_at("契約書_20231201", &dated_folder(), today()),
            "契約書_20231201"
        );
        assert_eq!(
            sanitize_at("報告書19991231", &dated_folder(), today()),
            "報告書19991231"
        );
    }

    #[test]
    fn empty_input_yields_fallback() {
        assert_eq!(sanitize_at("", &folder(), today()), FALLBACK_NAME);
        assert_eq!(sanitize_at("   \n何か", &folder(), today()), FALLBACK_NAME);
    }

    #[test]
    fn sanitize_is_idempotent() {
        for input in ["見積書_株式会社ABC", "契約書 2024", "Invoice March", FALLBACK_NAME] {
            let once = sanitize_at(input, &folder(), today());
            let twice = sanitize_at(&once, &folder(), today());
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn sanitize_output_is_always_legal() {
        let inputs = [
            "ファイル名：「見積書/2024」\nこの文書は…",
            "a\u{0000}b<c>d:e\"f/g\\h|i?j*k",
            "   ",
            "この文書は何かです。",
        ];
        for input in inputs {
            let out = sanitize_at(input, &dated_folder(), today());
            assert!(!out.is_empty());
            assert!(out.chars().all(|c| !is_forbidden(c) && !c.is_control()), "illegal output {out:?}");
        }
    }

    #[test]
    fn truncate_returns_short_names_unchanged() {
        assert_eq!(truncate_stem("見積書", 40), "見積書");
    }

    #[test]
    fn truncate_never_exceeds_limit() {
        let long: String = "あ".repeat(100);
        for max in [0, 10, 20, 40, 80, 200] {
            let out = truncate_stem(&long, max);
            let clamped = max.clamp(MIN_STEM_LEN, MAX_STEM_LEN);
            assert!(out.chars().count() <= clamped, "len {} > {clamped}", out.chars().count());
        }
    }

    #[test]
    fn truncate_clamps_configured_limit() {
        // A limit below 20 behaves as 20.
        let long: String = "あ".repeat(30);
        assert_eq!(truncate_stem(&long, 5).chars().count(), 20);
    }

    #[test]
    fn truncate_prefers_break_character() {
        // Break (underscore) at index 12, within the limit and past the
        // 10-character minimum prefix.
        let name = "取締役会議事録抜粋資料一_株式会社テストカンパニー総務部";
        let out = truncate_stem(name, 20);
        assert_eq!(out, "取締役会議事録抜粋資料一");
    }

    #[test]
    fn truncate_hard_cuts_when_break_prefix_too_short() {
        // Only break character is at index 3, below the minimum prefix, so the
        // cut lands at exactly max_len characters.
        let name = "請求書（株式会社テストカンパニー）２０２４年度";
        let out = truncate_stem(name, 20);
        assert_eq!(out.chars().count(), 20);
        assert_eq!(out, "請求書（株式会社テストカンパニー）２０２");
    }

    #[test]
    fn truncate_break_at_limit_position_is_used() {
        let stem = "あ".repeat(20);
        let name = format!("{stem}_おまけのながいぶぶん");
        // Break character sits exactly at index 20.
        assert_eq!(truncate_stem(&name, 20), stem);
    }
}
