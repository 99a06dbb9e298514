//! Lightweight language hint for the response generator.
//!
//! Each candidate language scores one point when the message contains one of
//! its accented characters and one when it contains one of its keywords. The
//! best score wins; ties keep the earlier candidate. No signal means English.

pub const DEFAULT_LANGUAGE: &str = "en";

struct LanguageProfile {
    code: &'static str,
    accents: &'static [char],
    keywords: &'static [&'static str],
}

const PROFILES: &[LanguageProfile] = &[
    LanguageProfile {
        code: "es",
        accents: &['ñ', 'á', 'é', 'í', 'ó', 'ú', '¿', '¡'],
        keywords: &[
            "hola", "gracias", "por favor", "buenos", "buenas", "qué", "cómo", "dónde", "cuánto",
            "tiene", "tienen", "quiero", "busco", "necesito",
        ],
    },
    LanguageProfile {
        code: "fr",
        accents: &['à', 'â', 'ç', 'è', 'ê', 'ë', 'î', 'ï', 'ô', 'ù', 'û', 'œ'],
        keywords: &["bonjour", "merci", "je voudrais", "comment", "où", "combien", "avez-vous", "cherche"],
    },
    LanguageProfile {
        code: "pt",
        accents: &['ã', 'õ', 'â', 'ê', 'ô', 'á', 'é', 'í', 'ó', 'ú', 'ç'],
        keywords: &[
            "olá", "obrigado", "bom dia", "boa tarde", "onde", "quanto", "tenho", "quero",
            "preciso",
        ],
    },
    LanguageProfile {
        code: "de",
        accents: &['ä', 'ö', 'ü', 'ß'],
        keywords: &["hallo", "danke", "bitte", "guten", "wieviel", "möchte", "suche", "brauche"],
    },
    LanguageProfile {
        code: "it",
        accents: &['à', 'è', 'é', 'ì', 'ò', 'ù'],
        keywords: &["ciao", "grazie", "per favore", "buongiorno", "dove", "avete", "vorrei", "cerco"],
    },
];

/// ISO 639-1 code of the most likely language of `text`.
pub fn detect_language(text: &str) -> &'static str {
    let normalized = text.to_lowercase();
    let words = normalized
        .split(|character: char| !character.is_alphanumeric() && character != '-')
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>();

    let mut best = (DEFAULT_LANGUAGE, 0u8);
    for profile in PROFILES {
        let mut score = 0u8;
        if normalized.chars().any(|character| profile.accents.contains(&character)) {
            score += 1;
        }
        if profile.keywords.iter().any(|keyword| keyword_matches(keyword, &normalized, &words)) {
            score += 1;
        }
        if score > best.1 {
            best = (profile.code, score);
        }
    }
    best.0
}

fn keyword_matches(keyword: &str, normalized: &str, words: &[&str]) -> bool {
    if keyword.contains(' ') {
        normalized.contains(keyword)
    } else {
        words.contains(&keyword)
    }
}

#[cfg(test)]
mod tests {
    use super::detect_language;

    #[test]
    fn english_is_the_default() {
        assert_eq!(detect_language("Do you have this jacket in medium?"), "en");
        assert_eq!(detect_language(""), "en");
    }

    #[test]
    fn keywords_and_accents_pick_the_language() {
        assert_eq!(detect_language("Hola, ¿tienen vestidos rojos?"), "es");
        assert_eq!(detect_language("Bonjour, je voudrais une robe"), "fr");
        assert_eq!(detect_language("Guten Tag, ich möchte eine Jacke"), "de");
        assert_eq!(detect_language("Ciao, vorrei una camicia"), "it");
        assert_eq!(detect_language("Olá, quero uma camisa"), "pt");
    }

    #[test]
    fn keywords_match_whole_words_only() {
        assert_eq!(detect_language("I would like a bitter chocolate scarf"), "en");
        assert_eq!(detect_language("wondering about the tempo of delivery"), "en");
    }
}
