use anyhow::{Result, bail};
use filecrypt::{SecretKey, load_key};
use std::io::{self, IsTerminal};
use zeroize::Zeroizing;

/// Resolves the secret key.
///
/// `explicit` carries `--key` or `FILECRYPT_KEY` (clap reads both, and
/// `.env` has already been loaded). Without it the key is read from piped
/// stdin or prompted for on a terminal.
pub fn read_key(explicit: Option<String>) -> Result<SecretKey> {
    let raw = match explicit {
        Some(k) if !k.is_empty() => Zeroizing::new(k),
        _ => read_key_interactive()?,
    };

    Ok(load_key(&raw)?)
}

fn read_key_interactive() -> Result<Zeroizing<String>> {
    //  echo "$KEY" | filecrypt decrypt -f notes_encrypt.md
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_line(&mut buf)?;
        let key = Zeroizing::new(buf.trim_end().to_string());

        if !key.is_empty() {
            return Ok(key);
        }
    }

    if io::stdin().is_terminal() {
        let key = Zeroizing::new(rpassword::prompt_password("Key: ")?);
        if !key.is_empty() {
            return Ok(key);
        }
    }

    bail!("no key provided; pass --key or set FILECRYPT_KEY")
}
