// src/common/text.rs

/// Remove acentos do português (e variações comuns) e coloca em minúsculas.
/// Usado para comparar modalidades, nomes de quadra e nomes de clientes.
pub fn fold_diacritics(input: &str) -> String {
    input
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// Forma canônica: sem acento, minúscula, espaços colapsados.
pub fn canonical(input: &str) -> String {
    fold_diacritics(input)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Corta em `max` caracteres (nunca no meio de um char).
pub fn preview(input: &str, max: usize) -> String {
    match input.char_indices().nth(max) {
        Some((idx, _)) => input[..idx].to_string(),
        None => input.to_string(),
    }
}
