//! Rewriting of JVM descriptors and generic signatures.
//!
//! All functions take a class-name mapping callback returning `None` when a
//! class keeps its name. Only class-name tokens are ever substituted; every
//! other character is copied through.

use crate::error::ClassError;

fn is_base_type(c: u8) -> bool {
    matches!(c, b'Z' | b'B' | b'C' | b'S' | b'I' | b'J' | b'F' | b'D')
}

/// Remaps every class token of a field or method descriptor.
///
/// # Examples
///
/// ```
/// let mapped = srgremap::remap_descriptor("([La/B;I)La/C;", |class| match class {
///     "a/B" => Some("x/Y".to_owned()),
///     _ => None,
/// })
/// .unwrap();
/// assert_eq!(mapped, "([Lx/Y;I)La/C;");
/// ```
pub fn remap_descriptor<F>(desc: &str, map_class: F) -> Result<String, ClassError>
where
    F: Fn(&str) -> Option<String>,
{
    let bytes = desc.as_bytes();
    let mut out = String::with_capacity(desc.len());
    let mut pos = 0;
    let mut copied = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'L' => {
                let end = desc[pos..]
                    .find(';')
                    .map(|i| pos + i)
                    .ok_or(ClassError::Descriptor)?;
                let class = &desc[pos + 1..end];
                if class.is_empty() {
                    return Err(ClassError::Descriptor);
                }
                out.push_str(&desc[copied..=pos]);
                match map_class(class) {
                    Some(mapped) => out.push_str(&mapped),
                    None => out.push_str(class),
                }
                copied = end;
                pos = end + 1;
            }
            b'(' | b')' | b'[' | b'V' => pos += 1,
            c if is_base_type(c) => pos += 1,
            _ => return Err(ClassError::Descriptor),
        }
    }
    out.push_str(&desc[copied..]);
    Ok(out)
}

/// Remaps a class constant name, which is either an internal class name or an
/// array descriptor such as `[La/B;`.
pub fn remap_type_name<F>(name: &str, map_class: F) -> Result<String, ClassError>
where
    F: Fn(&str) -> Option<String>,
{
    if name.starts_with('[') {
        remap_descriptor(name, map_class)
    } else {
        Ok(map_class(name).unwrap_or_else(|| name.to_owned()))
    }
}

/// Returns the class name of a method's object return type, if any.
pub(crate) fn return_class(method_desc: &str) -> Option<&str> {
    let (_, ret) = method_desc.rsplit_once(')')?;
    ret.strip_prefix('L')?.strip_suffix(';')
}

/// Which grammar rule a generic signature follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureKind {
    /// A `Signature` attribute on a class.
    Class,
    /// A `Signature` attribute on a method.
    Method,
    /// A field, record component or local variable signature.
    Type,
}

/// Remaps the class names inside a generic signature.
///
/// Inner class segments (`LOuter<TT;>.Inner;`) are remapped through the full
/// `Outer$Inner` name, emitting only the new inner suffix.
pub fn remap_signature<F>(
    signature: &str,
    kind: SignatureKind,
    map_class: F,
) -> Result<String, ClassError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut remapper = SignatureRemapper {
        sig: signature,
        pos: 0,
        out: String::with_capacity(signature.len()),
        map_class,
    };
    match kind {
        SignatureKind::Class => remapper.class_signature()?,
        SignatureKind::Method => remapper.method_signature()?,
        SignatureKind::Type => remapper.field_type_signature()?,
    }
    if remapper.pos != signature.len() {
        return Err(ClassError::Descriptor);
    }
    Ok(remapper.out)
}

struct SignatureRemapper<'s, F> {
    sig: &'s str,
    pos: usize,
    out: String,
    map_class: F,
}

impl<'s, F> SignatureRemapper<'s, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn peek(&self) -> Option<u8> {
        self.sig.as_bytes().get(self.pos).copied()
    }

    fn expect(&mut self, c: u8) -> Result<(), ClassError> {
        if self.peek() != Some(c) {
            return Err(ClassError::Descriptor);
        }
        self.out.push(c as char);
        self.pos += 1;
        Ok(())
    }

    fn take_until(&mut self, stop: &[u8]) -> Result<&'s str, ClassError> {
        let rest = &self.sig[self.pos..];
        let len = rest
            .bytes()
            .position(|c| stop.contains(&c))
            .ok_or(ClassError::Descriptor)?;
        self.pos += len;
        Ok(&rest[..len])
    }

    fn map(&self, class: &str) -> String {
        (self.map_class)(class).unwrap_or_else(|| class.to_owned())
    }

    fn class_signature(&mut self) -> Result<(), ClassError> {
        if self.peek() == Some(b'<') {
            self.type_parameters()?;
        }
        self.class_type_signature()?;
        while self.peek().is_some() {
            self.class_type_signature()?;
        }
        Ok(())
    }

    fn method_signature(&mut self) -> Result<(), ClassError> {
        if self.peek() == Some(b'<') {
            self.type_parameters()?;
        }
        self.expect(b'(')?;
        while self.peek() != Some(b')') {
            self.type_signature()?;
        }
        self.expect(b')')?;
        if self.peek() == Some(b'V') {
            self.expect(b'V')?;
        } else {
            self.type_signature()?;
        }
        while self.peek() == Some(b'^') {
            self.expect(b'^')?;
            self.field_type_signature()?;
        }
        Ok(())
    }

    fn type_parameters(&mut self) -> Result<(), ClassError> {
        self.expect(b'<')?;
        while self.peek() != Some(b'>') {
            let ident = self.take_until(b":")?;
            if ident.is_empty() {
                return Err(ClassError::Descriptor);
            }
            self.out.push_str(ident);
            while self.peek() == Some(b':') {
                self.expect(b':')?;
                if matches!(self.peek(), Some(b'L' | b'[' | b'T')) {
                    self.field_type_signature()?;
                }
            }
        }
        self.expect(b'>')
    }

    fn type_signature(&mut self) -> Result<(), ClassError> {
        match self.peek() {
            Some(c) if is_base_type(c) => self.expect(c),
            _ => self.field_type_signature(),
        }
    }

    fn field_type_signature(&mut self) -> Result<(), ClassError> {
        match self.peek() {
            Some(b'L') => self.class_type_signature(),
            Some(b'[') => {
                self.expect(b'[')?;
                self.type_signature()
            }
            Some(b'T') => {
                self.expect(b'T')?;
                let var = self.take_until(b";")?;
                self.out.push_str(var);
                self.expect(b';')
            }
            _ => Err(ClassError::Descriptor),
        }
    }

    fn class_type_signature(&mut self) -> Result<(), ClassError> {
        self.expect(b'L')?;
        let mut full_name = self.take_until(b"<.;")?.to_owned();
        let mapped = self.map(&full_name);
        self.out.push_str(&mapped);
        if self.peek() == Some(b'<') {
            self.type_arguments()?;
        }

        while self.peek() == Some(b'.') {
            self.pos += 1;
            let inner = self.take_until(b"<.;")?;
            let outer_prefix = format!("{}$", self.map(&full_name));
            full_name.push('$');
            full_name.push_str(inner);
            let remapped = self.map(&full_name);
            let start = if remapped.starts_with(&outer_prefix) {
                outer_prefix.len()
            } else {
                remapped.rfind('$').map_or(0, |i| i + 1)
            };
            self.out.push('.');
            self.out.push_str(&remapped[start..]);
            if self.peek() == Some(b'<') {
                self.type_arguments()?;
            }
        }
        self.expect(b';')
    }

    fn type_arguments(&mut self) -> Result<(), ClassError> {
        self.expect(b'<')?;
        while self.peek() != Some(b'>') {
            match self.peek() {
                Some(b'*') => self.expect(b'*')?,
                Some(c @ (b'+' | b'-')) => {
                    self.expect(c)?;
                    self.field_type_signature()?;
                }
                _ => self.field_type_signature()?,
            }
        }
        self.expect(b'>')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn classes() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("a", "com/example/Outer"),
            ("a$b", "com/example/Outer$Inner"),
            ("c", "com/example/Thing"),
        ])
    }

    fn mapper(class: &str) -> Option<String> {
        classes().get(class).map(|s| s.to_string())
    }

    #[test]
    fn descriptors() {
        let tests = [
            ("I", "I"),
            ("[[J", "[[J"),
            ("La;", "Lcom/example/Outer;"),
            ("[La$b;", "[Lcom/example/Outer$Inner;"),
            ("()V", "()V"),
            ("(ILa;[Lc;)Ljava/lang/String;", "(ILcom/example/Outer;[Lcom/example/Thing;)Ljava/lang/String;"),
        ];
        for (desc, expected) in tests {
            assert_eq!(remap_descriptor(desc, mapper).unwrap(), expected);
        }
    }

    #[test]
    fn invalid_descriptors() {
        for desc in ["La", "L;", "(Q)V", "Lfoo"] {
            assert_eq!(remap_descriptor(desc, mapper), Err(ClassError::Descriptor));
        }
    }

    #[test]
    fn type_names() {
        assert_eq!(remap_type_name("a", mapper).unwrap(), "com/example/Outer");
        assert_eq!(remap_type_name("[La;", mapper).unwrap(), "[Lcom/example/Outer;");
        assert_eq!(remap_type_name("x/Y", mapper).unwrap(), "x/Y");
    }

    #[test]
    fn return_classes() {
        assert_eq!(return_class("(I)La/B;"), Some("a/B"));
        assert_eq!(return_class("(I)[La/B;"), None);
        assert_eq!(return_class("()V"), None);
    }

    #[test]
    fn class_signatures() {
        let sig = "<T:Ljava/lang/Object;U::Ljava/lang/Comparable<TU;>;>La<TT;>;Ljava/util/List<+Lc;>;";
        assert_eq!(
            remap_signature(sig, SignatureKind::Class, mapper).unwrap(),
            "<T:Ljava/lang/Object;U::Ljava/lang/Comparable<TU;>;>Lcom/example/Outer<TT;>;Ljava/util/List<+Lcom/example/Thing;>;"
        );
    }

    #[test]
    fn method_signatures() {
        let sig = "<LT:La;>(TLT;[Ljava/util/Map<Lc;*>;I)La<TLT;>.b<-Lc;>;^La;^TLT;";
        assert_eq!(
            remap_signature(sig, SignatureKind::Method, mapper).unwrap(),
            "<LT:Lcom/example/Outer;>(TLT;[Ljava/util/Map<Lcom/example/Thing;*>;I)Lcom/example/Outer<TLT;>.Inner<-Lcom/example/Thing;>;^Lcom/example/Outer;^TLT;"
        );
    }

    #[test]
    fn type_signatures() {
        assert_eq!(
            remap_signature("Ljava/util/List<La;>;", SignatureKind::Type, mapper).unwrap(),
            "Ljava/util/List<Lcom/example/Outer;>;"
        );
        assert_eq!(
            remap_signature("TT;", SignatureKind::Type, mapper).unwrap(),
            "TT;"
        );
        assert!(remap_signature("Ljava/util/List<La;>", SignatureKind::Type, mapper).is_err());
    }
}
