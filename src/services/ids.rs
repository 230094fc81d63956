// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Document ID generation.

use ring::rand::{SecureRandom, SystemRandom};

use crate::error::AppError;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const ID_LEN: usize = 20;
// Largest multiple of the alphabet size below 256; bytes above it are
// discarded so every character is equally likely.
const UNBIASED_LIMIT: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

/// Generate a 20-character alphanumeric document ID, like Firestore's
/// client-side auto IDs.
pub fn new_document_id() -> Result<String, AppError> {
    let rng = SystemRandom::new();
    let mut id = String::with_capacity(ID_LEN);
    let mut buf = [0u8; 32];

    while id.len() < ID_LEN {
        rng.fill(&mut buf)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("system RNG failure")))?;
        for &byte in buf.iter().filter(|&&b| b < UNBIASED_LIMIT) {
            if id.len() == ID_LEN {
                break;
            }
            id.push(ALPHABET[byte as usize % ALPHABET.len()] as char);
        }
    }

    Ok(id)
}
