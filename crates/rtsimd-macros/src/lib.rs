//! Compile-time pseudo-op encoding for [`rtsimd`](https://crates.io/crates/rtsimd).
//!
//! Provides the [`simd_bytes!`] macro, which encodes a pseudo-op listing for
//! one profile at compile time and produces a `&'static [u8]` constant.
//!
//! # Usage
//!
//! ```rust,ignore
//! use rtsimd_macros::simd_bytes;
//!
//! // AVX2, packed fp32
//! const KERNEL: &[u8] = simd_bytes!(x64_avx2_f32, "mul x0, x1\nadd x0, x2");
//!
//! // 64-bit Power VSX, fp64 (big-endian words)
//! const P64: &[u8] = simd_bytes!(p64_vsx1_f64, "fma x0, x1, x2");
//! ```

use proc_macro::TokenStream;

const PROFILES: &str = "x86_avx1_f32, x86_avx2_f32, x64_avx1_f32, x64_avx2_f32, x64_avx1_f64, \
                        x64_avx2_f64, p64_vsx1_f64, p64_vsx2_f64, p32_vsx1_f32x2, p32_vsx2_f32x2";

/// Encode a listing at compile time, producing a `&'static [u8]` byte slice.
///
/// # Syntax
///
/// ```rust,ignore
/// simd_bytes!(PROFILE, "listing")
/// ```
///
/// where `PROFILE` is a profile name with underscores, e.g. `x64_avx2_f32`
/// or `p32_vsx2_f32x2`.
///
/// # Examples
///
/// ```rust,ignore
/// use rtsimd_macros::simd_bytes;
///
/// const ADD: &[u8] = simd_bytes!(x64_avx2_f32, "add x0, x1");
/// assert_eq!(ADD, &[0xC4, 0xE1, 0x7C, 0x58, 0xC1]);
///
/// // Labels and statement separators work as in `rtsimd::assemble`
/// const LOOP: &[u8] = simd_bytes!(x64_avx2_f32, "
///     top:
///         sub x0, x1 ; mkj.none x0, top
/// ");
/// ```
///
/// # Compile-time errors
///
/// An unknown profile, a profile whose family is compiled out, or any
/// encoding failure becomes a `compile_error!` carrying the
/// `EncodeError` message.
#[proc_macro]
pub fn simd_bytes(input: TokenStream) -> TokenStream {
    match simd_bytes_impl(input) {
        Ok(ts) => ts,
        Err(err) => err.into_compile_error(),
    }
}

/// Encode a listing at compile time, producing a fixed-size array `[u8; N]`.
///
/// # Examples
///
/// ```rust,ignore
/// use rtsimd_macros::simd_array;
///
/// const ADD: [u8; 4] = simd_array!(x86_avx2_f32, "add x0, x1");
/// ```
#[proc_macro]
pub fn simd_array(input: TokenStream) -> TokenStream {
    match simd_array_impl(input) {
        Ok(ts) => ts,
        Err(err) => err.into_compile_error(),
    }
}

// ─── Implementation ─────────────────────────────────────────────────────────

struct MacroInput {
    profile: rtsimd::ProfileId,
    source: String,
    /// Span of the listing literal for error reporting.
    source_span: proc_macro::Span,
}

fn parse_input(input: TokenStream) -> Result<MacroInput, syn_free::Error> {
    let mut tokens = input.into_iter().peekable();

    let profile_tt = tokens
        .next()
        .ok_or_else(|| syn_free::Error::new(&format!("expected profile identifier ({PROFILES})")))?;
    let profile = parse_profile(&profile_tt)?;

    expect_comma(&mut tokens)?;

    let (source, source_span) = parse_string_literal(&mut tokens)?;

    // A trailing comma is tolerated, nothing else.
    if let Some(proc_macro::TokenTree::Punct(p)) = tokens.peek() {
        if p.as_char() == ',' {
            tokens.next();
        }
    }
    if let Some(extra) = tokens.next() {
        return Err(syn_free::Error::with_span(
            extra.span(),
            "unexpected extra tokens after listing string",
        ));
    }

    Ok(MacroInput {
        profile,
        source,
        source_span,
    })
}

fn simd_bytes_impl(input: TokenStream) -> Result<TokenStream, syn_free::Error> {
    let mi = parse_input(input)?;
    let bytes = do_assemble(&mi)?;
    bytes_to_slice_expr(&bytes)
}

fn simd_array_impl(input: TokenStream) -> Result<TokenStream, syn_free::Error> {
    let mi = parse_input(input)?;
    let bytes = do_assemble(&mi)?;
    bytes_to_array_expr(&bytes)
}

fn do_assemble(mi: &MacroInput) -> Result<Vec<u8>, syn_free::Error> {
    rtsimd::assemble(&mi.source, mi.profile)
        .map(rtsimd::AssemblyResult::into_bytes)
        .map_err(|e| syn_free::Error::with_span(mi.source_span, &format!("encoding error: {e}")))
}

fn parse_profile(tt: &proc_macro::TokenTree) -> Result<rtsimd::ProfileId, syn_free::Error> {
    let proc_macro::TokenTree::Ident(id) = tt else {
        return Err(syn_free::Error::with_span(
            tt.span(),
            &format!("expected profile identifier ({PROFILES})"),
        ));
    };
    let ident = id.to_string();
    rtsimd::ProfileId::from_name(&ident).ok_or_else(|| {
        syn_free::Error::with_span(tt.span(), &format!("unknown profile `{ident}`, expected one of: {PROFILES}"))
    })
}

fn expect_comma(
    tokens: &mut std::iter::Peekable<proc_macro::token_stream::IntoIter>,
) -> Result<(), syn_free::Error> {
    match tokens.next() {
        Some(proc_macro::TokenTree::Punct(p)) if p.as_char() == ',' => Ok(()),
        Some(other) => Err(syn_free::Error::with_span(other.span(), "expected `,`")),
        None => Err(syn_free::Error::new("expected `,`")),
    }
}

fn parse_string_literal(
    tokens: &mut std::iter::Peekable<proc_macro::token_stream::IntoIter>,
) -> Result<(String, proc_macro::Span), syn_free::Error> {
    let tt = tokens
        .next()
        .ok_or_else(|| syn_free::Error::new("expected listing string literal"))?;
    let proc_macro::TokenTree::Literal(lit) = &tt else {
        return Err(syn_free::Error::with_span(tt.span(), "expected listing string literal"));
    };
    let raw = lit.to_string();
    let malformed = || syn_free::Error::with_span(tt.span(), "malformed string literal");
    let content = if let Some(rest) = raw.strip_prefix("r#\"") {
        rest.strip_suffix("\"#").ok_or_else(malformed)?.to_string()
    } else if let Some(rest) = raw.strip_prefix("r\"") {
        rest.strip_suffix('"').ok_or_else(malformed)?.to_string()
    } else if let Some(rest) = raw.strip_prefix('"') {
        unescape_string(rest.strip_suffix('"').ok_or_else(malformed)?)
    } else {
        return Err(syn_free::Error::with_span(tt.span(), "expected listing string literal"));
    };
    Ok((content, tt.span()))
}

fn unescape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('0') => out.push('\0'),
            // line continuation: skip the newline and leading whitespace
            Some('\n') => {
                let rest: String = chars.by_ref().skip_while(|c| c.is_whitespace()).collect();
                out.push_str(&unescape_string(&rest));
                return out;
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn byte_list(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:#04X}u8"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn bytes_to_slice_expr(bytes: &[u8]) -> Result<TokenStream, syn_free::Error> {
    let inner = byte_list(bytes);
    syn_free::parse(&format!("{{ const BYTES: &[u8] = &[{inner}]; BYTES }}"))
}

fn bytes_to_array_expr(bytes: &[u8]) -> Result<TokenStream, syn_free::Error> {
    let len = bytes.len();
    let inner = byte_list(bytes);
    syn_free::parse(&format!("{{ const BYTES: [u8; {len}] = [{inner}]; BYTES }}"))
}

// ─── Minimal syn-free error type ─────────────────────────────────────────────
// The macro input is a profile identifier and one string literal, so it is
// parsed straight from `proc_macro::TokenStream` without `syn`.

mod syn_free {
    use proc_macro::{Span, TokenStream};

    pub struct Error {
        message: String,
        span: Option<Span>,
    }

    impl Error {
        pub fn new(msg: &str) -> Self {
            Self {
                message: msg.to_string(),
                span: None,
            }
        }

        pub fn with_span(span: Span, msg: &str) -> Self {
            Self {
                message: msg.to_string(),
                span: Some(span),
            }
        }

        pub fn into_compile_error(self) -> TokenStream {
            let msg = self.message.replace('\\', "\\\\").replace('"', "\\\"");
            let Ok(ts) = format!("compile_error!(\"{msg}\")").parse::<TokenStream>() else {
                return TokenStream::new();
            };
            match self.span {
                Some(span) => ts
                    .into_iter()
                    .map(|mut tt| {
                        tt.set_span(span);
                        tt
                    })
                    .collect(),
                None => ts,
            }
        }
    }

    pub fn parse(code: &str) -> Result<TokenStream, Error> {
        code.parse()
            .map_err(|_| Error::new("internal error: generated byte expression did not parse"))
    }
}
