// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

//! Keyword lexicons shared by the critics. Terms are lowercase; English and
//! Brazilian Portuguese variants are listed side by side.

use once_cell::sync::Lazy;
use regex::Regex;

pub const HIGH_PRESSURE: &[&str] = &[
    "buy now",
    "act now",
    "last chance",
    "don't miss",
    "dont miss",
    "only today",
    "before it's gone",
    "compre agora",
    "última chance",
    "ultima chance",
    "não perca",
    "nao perca",
    "só hoje",
    "aproveite já",
];

pub const MODERATE_SUGGESTION: &[&str] = &[
    "i recommend",
    "you should",
    "you'll love",
    "great choice",
    "worth it",
    "recomendo",
    "você deveria",
    "voce deveria",
    "vale a pena",
    "ótima escolha",
];

pub const SOFT_OFFER: &[&str] = &[
    "if you'd like",
    "if you want",
    "feel free",
    "you might",
    "another option",
    "se quiser",
    "se preferir",
    "fique à vontade",
    "outra opção",
];

pub const FALSE_URGENCY: &[&str] = &[
    "limited time",
    "limited stock",
    "selling fast",
    "expires today",
    "ends tonight",
    "last units",
    "almost sold out",
    "por tempo limitado",
    "estoque limitado",
    "últimas unidades",
    "ultimas unidades",
    "acaba hoje",
    "quase esgotado",
];

pub const HUMAN_EXPERTISE: &[&str] = &[
    "as an expert",
    "as a specialist",
    "i personally",
    "in my experience",
    "i guarantee",
    "trust me",
    "100% sure",
    "i'm human",
    "i am human",
    "como especialista",
    "eu garanto",
    "pode confiar",
    "na minha experiência",
    "sou humano",
];

pub const PRICE_HISTORY: &[&str] = &[
    "was cheaper",
    "used to cost",
    "price went up",
    "price will go up",
    "before it was",
    "estava mais barato",
    "antes custava",
    "o preço subiu",
    "preço vai subir",
];

pub const ADDITION_CLAIMS: &[&str] = &[
    "added",
    "adicionei",
    "adicionado",
    "adicionada",
    "coloquei no carrinho",
    "incluí",
];

pub const HIGH_CERTAINTY: &[&str] = &[
    "definitely",
    "certainly",
    "absolutely",
    "guaranteed",
    "without a doubt",
    "100%",
    "com certeza",
    "certamente",
    "definitivamente",
    "sem dúvida",
    "garantido",
];

pub const FRUSTRATION: &[&str] = &[
    "frustrated",
    "angry",
    "annoyed",
    "terrible",
    "awful",
    "ridiculous",
    "unacceptable",
    "worst",
    "disappointed",
    "useless",
    "frustrado",
    "irritado",
    "péssimo",
    "pessimo",
    "horrível",
    "horrivel",
    "ridículo",
    "absurdo",
    "inaceitável",
    "decepcionado",
];

pub const FAILURE_ADMISSION: &[&str] = &[
    "i can't",
    "i cannot",
    "i'm unable",
    "i am unable",
    "unable to",
    "i don't know",
    "i do not know",
    "não consigo",
    "nao consigo",
    "não posso",
    "não sei",
    "nao sei",
];

pub const DISPUTE: &[&str] = &[
    "refund",
    "chargeback",
    "dispute",
    "fraud",
    "scam",
    "stolen",
    "unauthorized charge",
    "reembolso",
    "estorno",
    "fraude",
    "golpe",
    "procon",
    "contestar",
];

static FACTUAL_QUESTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(who|when|where|how many|quem|quando|onde|quantos|quantas)\b")
        .expect("factual question pattern is valid")
});

static ONLY_N_LEFT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bonly \d+ (left|remaining)\b|\brestam apenas \d+\b")
        .expect("scarcity pattern is valid")
});

/// Total number of occurrences of every term in `text`.
pub fn count_matches(text: &str, terms: &[&str]) -> usize {
    let lowered = text.to_lowercase();
    terms
        .iter()
        .map(|term| lowered.matches(term).count())
        .sum()
}

pub fn contains_any(text: &str, terms: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    terms.iter().any(|term| lowered.contains(term))
}

pub fn is_factual_question(text: &str) -> bool {
    FACTUAL_QUESTION.is_match(text)
}

pub fn claims_scarcity(text: &str) -> bool {
    contains_any(text, FALSE_URGENCY) || ONLY_N_LEFT.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_matches_is_case_insensitive() {
        let text = "This is RIDICULOUS. Absolutely ridiculous and unacceptable.";
        assert_eq!(count_matches(text, FRUSTRATION), 3);
    }

    #[test]
    fn test_factual_question_detection() {
        assert!(is_factual_question("When does the store open?"));
        assert!(is_factual_question("Quantos dias para entrega?"));
        assert!(!is_factual_question("I love this jacket"));
    }

    #[test]
    fn test_scarcity_detection() {
        assert!(claims_scarcity("Hurry, only 3 left in stock"));
        assert!(claims_scarcity("Últimas unidades disponíveis"));
        assert!(!claims_scarcity("We have plenty in stock"));
    }
}
