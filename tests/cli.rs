use assert_cmd::Command;
use predicates::prelude::*;

const ABC_HASH: &str = "$2a$06$If6bvum7DFjUnE9p2uDeDu0YHzrHM6tf.iqN8.yx.jNN1ILEf7h0i";

fn bin() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("bcrypt"));
    cmd.env_remove("BCRYPT_ROUNDS")
        .env_remove("BCRYPT_VARIANT")
        .env_remove("BCRYPT_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

fn hash_of(password: &str, rounds: &str) -> String {
    let output = bin()
        .arg("--rounds")
        .arg(rounds)
        .arg(password)
        .output()
        .unwrap();
    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap().trim_end().to_string()
}

#[test]
fn hashing_prints_a_hash() {
    bin()
        .arg("-r")
        .arg("4")
        .arg("hunter2")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^\$2a\$04\$[./A-Za-z0-9]{53}\n$").unwrap());
}

#[test]
fn default_rounds_are_ten() {
    bin()
        .arg("pw")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("$2a$10$"));
}

#[test]
fn rounds_from_environment() {
    bin()
        .env("BCRYPT_ROUNDS", "5")
        .arg("pw")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("$2a$05$"));
}

#[test]
fn variant_selects_version_tag() {
    bin()
        .arg("-r")
        .arg("4")
        .arg("--variant")
        .arg("2b")
        .arg("pw")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("$2b$04$"));
}

#[test]
fn sign_extension_variant_cannot_be_generated() {
    bin()
        .arg("--variant")
        .arg("2x")
        .arg("pw")
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("ERROR[bcrypt]:"));
}

#[test]
fn hash_then_check_roundtrip() {
    let hash = hash_of("correct horse", "4");

    bin()
        .arg("correct horse")
        .arg(&hash)
        .assert()
        .success()
        .stdout("OK\n");

    bin()
        .arg("wrong horse")
        .arg(&hash)
        .assert()
        .code(1)
        .stdout("FAIL\n");
}

#[test]
fn check_known_hash() {
    bin().arg("abc").arg(ABC_HASH).assert().success().stdout("OK\n");
}

#[test]
fn quiet_check_prints_nothing() {
    bin()
        .arg("-q")
        .arg("abc")
        .arg(ABC_HASH)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    bin()
        .arg("--quiet")
        .arg("abd")
        .arg(ABC_HASH)
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn rounds_are_ignored_when_checking() {
    bin()
        .arg("-r")
        .arg("12")
        .arg("abc")
        .arg(ABC_HASH)
        .assert()
        .success()
        .stdout("OK\n");
}

#[test]
fn malformed_hash_is_an_error() {
    bin()
        .arg("x")
        .arg("not-a-hash")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("ERROR[bcrypt]: malformed hash"));
}

#[test]
fn out_of_range_rounds_fail() {
    for rounds in ["3", "31", "ten"] {
        bin()
            .arg("-r")
            .arg(rounds)
            .arg("pw")
            .assert()
            .code(1)
            .stdout(predicate::str::is_empty())
            .stderr(predicate::str::starts_with("ERROR[bcrypt]:"))
            .stderr(predicate::str::contains("bad number of rounds"));
    }
}

#[test]
fn boundary_rounds_are_accepted() {
    bin()
        .arg("-r")
        .arg("4")
        .arg("pw")
        .assert()
        .success();
}

#[test]
fn too_many_arguments_fail() {
    bin()
        .arg("a")
        .arg(ABC_HASH)
        .arg("extra")
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("ERROR[bcrypt]:"));
}

#[test]
fn missing_password_fails() {
    bin()
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("ERROR[bcrypt]:"));
}

#[test]
fn help_succeeds() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--rounds"))
        .stdout(predicate::str::contains("--quiet"));
}

#[test]
fn password_from_environment() {
    bin()
        .env("BCRYPT_PASSWORD", "abc")
        .arg("-")
        .arg(ABC_HASH)
        .assert()
        .success()
        .stdout("OK\n");
}

#[test]
fn password_from_stdin() {
    bin()
        .arg("-")
        .arg(ABC_HASH)
        .write_stdin("abc\n")
        .assert()
        .success()
        .stdout("OK\n");

    bin()
        .arg("-")
        .arg(ABC_HASH)
        .write_stdin("abcd\n")
        .assert()
        .code(1)
        .stdout("FAIL\n");
}

#[test]
fn empty_password_is_valid() {
    let hash = hash_of("", "4");
    bin().arg("").arg(&hash).assert().success().stdout("OK\n");
    bin().arg("x").arg(&hash).assert().code(1).stdout("FAIL\n");
}
