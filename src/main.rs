#![allow(non_snake_case)]
use RustedPoissonFAC::Examples::fac_examples::fac_examples;

fn main() {
    let example = 2;
    match fac_examples(example) {
        Ok(norm) => println!("example {} finished, final residual norm {:e}", example, norm),
        Err(e) => println!("example {} failed: {}", example, e),
    }
}
