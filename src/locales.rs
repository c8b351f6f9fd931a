//! The fixed table of locales the citation renderer understands.
//!
//! Lookup is case-insensitive and canonicalizing: a bare language code
//! resolves to its default dialect (`"de"` → `"de-DE"`). Unknown codes
//! resolve to nothing; callers treat that as an error, never substituting
//! a fallback.

/// Canonical locale code for `code`, or `None` if unsupported.
pub fn lookup(code: &str) -> Option<&'static str> {
    let canonical = match code.to_lowercase().as_str() {
        "af" | "af-za" => "af-ZA",
        "ar" => "ar",
        "bg" | "bg-bg" => "bg-BG",
        "ca" | "ca-ad" => "ca-AD",
        "cs" | "cs-cz" => "cs-CZ",
        "cy" | "cy-gb" => "cy-GB",
        "da" | "da-dk" => "da-DK",
        "de" | "de-de" => "de-DE",
        "de-at" => "de-AT",
        "de-ch" => "de-CH",
        "el" | "el-gr" => "el-GR",
        "en" | "en-us" => "en-US",
        "en-gb" => "en-GB",
        "es" | "es-es" => "es-ES",
        "es-cl" => "es-CL",
        "es-mx" => "es-MX",
        "et" | "et-ee" => "et-EE",
        "eu" => "eu",
        "fa" | "fa-ir" => "fa-IR",
        "fi" | "fi-fi" => "fi-FI",
        "fr" | "fr-fr" => "fr-FR",
        "fr-ca" => "fr-CA",
        "he" | "he-il" => "he-IL",
        "hr" | "hr-hr" => "hr-HR",
        "hu" | "hu-hu" => "hu-HU",
        "id" | "id-id" => "id-ID",
        "is" | "is-is" => "is-IS",
        "it" | "it-it" => "it-IT",
        "ja" | "ja-jp" => "ja-JP",
        "km" | "km-kh" => "km-KH",
        "ko" | "ko-kr" => "ko-KR",
        "lt" | "lt-lt" => "lt-LT",
        "lv" | "lv-lv" => "lv-LV",
        "mn" | "mn-mn" => "mn-MN",
        "nb" | "nb-no" => "nb-NO",
        "nl" | "nl-nl" => "nl-NL",
        "nn" | "nn-no" => "nn-NO",
        "pl" | "pl-pl" => "pl-PL",
        "pt" | "pt-pt" => "pt-PT",
        "pt-br" => "pt-BR",
        "ro" | "ro-ro" => "ro-RO",
        "ru" | "ru-ru" => "ru-RU",
        "sk" | "sk-sk" => "sk-SK",
        "sl" | "sl-si" => "sl-SI",
        "sr" | "sr-rs" => "sr-RS",
        "sv" | "sv-se" => "sv-SE",
        "th" | "th-th" => "th-TH",
        "tr" | "tr-tr" => "tr-TR",
        "uk" | "uk-ua" => "uk-UA",
        "vi" | "vi-vn" => "vi-VN",
        "zh" | "zh-cn" => "zh-CN",
        "zh-tw" => "zh-TW",
        _ => return None,
    };
    Some(canonical)
}

/// Name of a canonical locale, in the local language and English.
pub fn name(code: &str) -> Option<&'static str> {
    let name = match code {
        "af-ZA" => "Afrikaans",
        "ar" => "العربية / Arabic",
        "bg-BG" => "Български / Bulgarian",
        "ca-AD" => "Català / Catalan",
        "cs-CZ" => "Čeština / Czech",
        "cy-GB" => "Cymraeg / Welsh",
        "da-DK" => "Dansk / Danish",
        "de-AT" => "Deutsch (Österreich) / German (Austria)",
        "de-CH" => "Deutsch (Schweiz) / German (Switzerland)",
        "de-DE" => "Deutsch (Deutschland) / German (Germany)",
        "el-GR" => "Ελληνικά / Greek",
        "en-GB" => "English (UK)",
        "en-US" => "English (US)",
        "es-CL" => "Español (Chile) / Spanish (Chile)",
        "es-ES" => "Español (España) / Spanish (Spain)",
        "es-MX" => "Español (México) / Spanish (Mexico)",
        "et-EE" => "Eesti / Estonian",
        "eu" => "Euskara / Basque",
        "fa-IR" => "فارسی / Persian",
        "fi-FI" => "Suomi / Finnish",
        "fr-CA" => "Français (Canada) / French (Canada)",
        "fr-FR" => "Français (France) / French (France)",
        "he-IL" => "עברית / Hebrew",
        "hr-HR" => "Hrvatski / Croatian",
        "hu-HU" => "Magyar / Hungarian",
        "id-ID" => "Bahasa Indonesia / Indonesian",
        "is-IS" => "Íslenska / Icelandic",
        "it-IT" => "Italiano / Italian",
        "ja-JP" => "日本語 / Japanese",
        "km-KH" => "ភាសាខ្មែរ / Khmer",
        "ko-KR" => "한국어 / Korean",
        "lt-LT" => "Lietuvių / Lithuanian",
        "lv-LV" => "Latviešu / Latvian",
        "mn-MN" => "Монгол / Mongolian",
        "nb-NO" => "Norsk bokmål / Norwegian (Bokmål)",
        "nl-NL" => "Nederlands / Dutch",
        "nn-NO" => "Norsk nynorsk / Norwegian (Nynorsk)",
        "pl-PL" => "Polski / Polish",
        "pt-BR" => "Português (Brasil) / Portuguese (Brazil)",
        "pt-PT" => "Português (Portugal) / Portuguese (Portugal)",
        "ro-RO" => "Română / Romanian",
        "ru-RU" => "Русский / Russian",
        "sk-SK" => "Slovenčina / Slovak",
        "sl-SI" => "Slovenščina / Slovenian",
        "sr-RS" => "Српски / Srpski / Serbian",
        "sv-SE" => "Svenska / Swedish",
        "th-TH" => "ไทย / Thai",
        "tr-TR" => "Türkçe / Turkish",
        "uk-UA" => "Українська / Ukrainian",
        "vi-VN" => "Tiếng Việt / Vietnamese",
        "zh-CN" => "中文 (中国大陆) / Chinese (PRC)",
        "zh-TW" => "中文 (台灣) / Chinese (Taiwan)",
        _ => return None,
    };
    Some(name)
}

/// Every supported locale as (code, name), sorted by name.
pub fn all() -> Vec<(&'static str, &'static str)> {
    const CODES: [&str; 52] = [
        "af-ZA", "ar", "bg-BG", "ca-AD", "cs-CZ", "cy-GB", "da-DK", "de-AT", "de-CH", "de-DE",
        "el-GR", "en-GB", "en-US", "es-CL", "es-ES", "es-MX", "et-EE", "eu", "fa-IR", "fi-FI",
        "fr-CA", "fr-FR", "he-IL", "hr-HR", "hu-HU", "id-ID", "is-IS", "it-IT", "ja-JP", "km-KH",
        "ko-KR", "lt-LT", "lv-LV", "mn-MN", "nb-NO", "nl-NL", "nn-NO", "pl-PL", "pt-BR", "pt-PT",
        "ro-RO", "ru-RU", "sk-SK", "sl-SI", "sr-RS", "sv-SE", "th-TH", "tr-TR", "uk-UA", "vi-VN",
        "zh-CN", "zh-TW",
    ];
    let mut locales: Vec<(&str, &str)> = CODES
        .iter()
        .filter_map(|c| name(c).map(|n| (*c, n)))
        .collect();
    locales.sort_by_key(|(_, n)| *n);
    locales
}
