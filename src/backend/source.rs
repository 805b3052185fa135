//! Device program for one Life generation.

pub const LIFE_ENTRY_POINT: &str = "life_next_state";

/// OpenCL C source. One work-item per cell; `rows`/`cols` are bound once as
/// scalars, `in` is the frozen generation and `out` the disjoint successor.
pub const LIFE_KERNEL_SOURCE: &str = r#"
__kernel void life_next_state(const uint rows, const uint cols,
                              __global const uchar *in,
                              __global uchar *out)
{
    const uint i = get_global_id(0);
    const uint j = get_global_id(1);
    const uint up = (i == 0) ? rows - 1 : i - 1;
    const uint down = (i + 1 == rows) ? 0 : i + 1;
    const uint left = (j == 0) ? cols - 1 : j - 1;
    const uint right = (j + 1 == cols) ? 0 : j + 1;

    uint sum = in[up * cols + left] + in[up * cols + j] + in[up * cols + right]
             + in[i * cols + left]  + in[i * cols + j]  + in[i * cols + right]
             + in[down * cols + left] + in[down * cols + j] + in[down * cols + right];

    const uchar alive = in[i * cols + j];
    out[i * cols + j] = alive ? (sum == 3 || sum == 4) : (sum == 3);
}
"#;
