//! Test fixtures - TypeScript sources and tsconfig files for testing

/// Compiles cleanly in both modes
pub fn simple_module() -> &'static str {
    r#"export const greeting: string = "hello";
export function shout(text: string): string {
    return text.toUpperCase();
}
"#
}

pub fn typed_function() -> &'static str {
    r#"export function add(a: number, b: number): number {
    return a + b;
}
"#
}

pub fn interface_program() -> &'static str {
    r#"interface Point {
    x: number;
    y: number;
}
export const origin = { x: 0, y: 0 };
"#
}

/// TS2322 on line 1
pub fn type_error_assignment() -> &'static str {
    "const x: string = 5;\nexport default x;\n"
}

/// TS1005
pub fn syntax_error_missing_brace() -> &'static str {
    "export function broken() {\n    return 1;\n"
}

/// A dependency whose exported value is a string
pub fn dependency_string_value() -> &'static str {
    "export const value = \"a\";\n"
}

/// The same dependency after its export changed type
pub fn dependency_number_value() -> &'static str {
    "export const value = 1;\n"
}

/// A test that only type-checks while `./dep` exports a string
pub fn test_importing_dependency() -> &'static str {
    r#"import { value } from "./dep";
const checked: string = value;
describe("dep", () => {
    it("is a string", () => expect(typeof checked).toBe("string"));
});
"#
}

pub fn declaration_file() -> &'static str {
    "export declare const value: string;\n"
}

pub fn plain_javascript() -> &'static str {
    "module.exports = { answer: 42 };\n"
}

pub fn tsconfig_commonjs() -> &'static str {
    r#"{
    // comments are allowed
    "compilerOptions": {
        "module": "commonjs",
        "target": "es2019",
        "strict": true,
    }
}
"#
}

pub fn tsconfig_esnext() -> &'static str {
    r#"{ "compilerOptions": { "module": "esnext", "target": "es2020" } }"#
}
