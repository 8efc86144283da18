use anyhow::Result;
use std::ffi::OsString;
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

pub const PASSWORD_ENV: &str = "BCRYPT_PASSWORD";

/// Reads the password when `-` is given in its place.
pub fn read_password() -> Result<Zeroizing<Vec<u8>>> {
    //  Environment Variable
    //  BCRYPT_PASSWORD="hunter2" bcrypt -
    if let Some(pw) = std::env::var_os(PASSWORD_ENV) {
        return Ok(Zeroizing::new(os_bytes(pw)?));
    }

    //  stdin (Pipeline)
    //  printf "%s" "hunter2" | bcrypt - '$2a$10$...'
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(Vec::new());
        io::stdin().lock().read_until(b'\n', &mut buf)?;
        trim_newline(&mut buf);
        return Ok(buf);
    }

    //  Interactive (TTY)
    let pw = Zeroizing::new(rpassword::prompt_password("Password: ")?);
    Ok(Zeroizing::new(pw.as_bytes().to_vec()))
}

/// Raw bytes of a command-line argument.
#[cfg(unix)]
pub fn os_bytes(arg: OsString) -> Result<Vec<u8>> {
    use std::os::unix::ffi::OsStringExt;
    Ok(arg.into_vec())
}

#[cfg(not(unix))]
pub fn os_bytes(arg: OsString) -> Result<Vec<u8>> {
    arg.into_string()
        .map(String::into_bytes)
        .map_err(|_| anyhow::anyhow!("password is not valid unicode"))
}

fn trim_newline(buf: &mut Vec<u8>) {
    while buf.ends_with(b"\n") || buf.ends_with(b"\r") {
        buf.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_line_endings_only() {
        let mut buf = b" pass word \r\n".to_vec();
        trim_newline(&mut buf);
        assert_eq!(buf, b" pass word ");

        let mut buf = Vec::new();
        trim_newline(&mut buf);
        assert!(buf.is_empty());
    }

    #[test]
    fn argument_bytes_are_kept() {
        assert_eq!(os_bytes(OsString::from("pässwörd")).unwrap(), "pässwörd".as_bytes());
    }
}
