use element::driver;
use element_utils::ElementResult;

fn main() -> ElementResult<()> {
    driver::run_compiler()
}
